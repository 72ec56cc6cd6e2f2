use vedirect_bridge::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    if let Err(e) = vedirect_bridge::app(options).await {
        error!("Application error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
