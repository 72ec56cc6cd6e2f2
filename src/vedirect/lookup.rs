// Display text for the numeric VE.Direct fields. Every function hands the raw
// text back unchanged when the code is unknown or does not parse.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Parses a decimal code, or a hexadecimal one when prefixed with 0x/0X.
pub fn parse_code(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.starts_with(['+', '-']) {
        return None;
    }

    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) if !hex.starts_with(['+', '-']) => i64::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None => digits.parse::<i64>().ok()?,
    };

    Some(if negative { -value } else { value })
}

fn lookup_or_raw(text: &str, describe: impl Fn(i64) -> Option<&'static str>) -> String {
    parse_code(text)
        .and_then(describe)
        .map(str::to_string)
        .unwrap_or_else(|| text.to_string())
}

/// PID
pub fn pid_as_string(pid: &str) -> String {
    lookup_or_raw(pid, product_name)
}

/// CS
pub fn cs_as_string(cs: &str) -> String {
    lookup_or_raw(cs, |code| {
        OperatingState::from_code(code).map(|state| state.description())
    })
}

/// ERR
pub fn err_as_string(err: &str) -> String {
    lookup_or_raw(err, error_description)
}

/// OR. Only single known reasons match; combined bits fall through to the
/// raw text.
pub fn or_as_string(off_reason: &str) -> String {
    lookup_or_raw(off_reason, |code| {
        OffReason::from_code(code).map(|reason| reason.description())
    })
}

/// MPPT
pub fn mppt_as_string(mppt: &str) -> String {
    lookup_or_raw(mppt, |code| {
        MpptState::from_code(code).map(|state| state.description())
    })
}

// OperatingState {{{
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OperatingState {
    Off = 0,
    Fault = 2,
    Bulk = 3,
    Absorption = 4,
    Float = 5,
    Equalize = 7,
    StartingUp = 245,
    AutoEqualize = 247,
    ExternalControl = 252,
}

impl OperatingState {
    pub fn from_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().and_then(|c| Self::try_from(c).ok())
    }

    pub fn description(&self) -> &'static str {
        use OperatingState::*;

        match self {
            Off => "OFF",
            Fault => "Fault",
            Bulk => "Bulk",
            Absorption => "Absorption",
            Float => "Float",
            Equalize => "Equalize (manual)",
            StartingUp => "Starting-up",
            AutoEqualize => "Auto equalize / Recondition",
            ExternalControl => "External Control",
        }
    }
} // }}}

// OffReason {{{
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum OffReason {
    NotOff = 0,
    NoInputPower = 1 << 0,
    PowerSwitch = 1 << 1,
    DeviceModeRegister = 1 << 2,
    RemoteInput = 1 << 3,
    ProtectionActive = 1 << 4,
    Paygo = 1 << 5,
    Bms = 1 << 6,
    EngineShutdown = 1 << 7,
    AnalysingInputVoltage = 1 << 8,
}

impl OffReason {
    pub fn from_code(code: i64) -> Option<Self> {
        u32::try_from(code).ok().and_then(|c| Self::try_from(c).ok())
    }

    pub fn description(&self) -> &'static str {
        use OffReason::*;

        match self {
            NotOff => "Not off",
            NoInputPower => "No input power",
            PowerSwitch => "Switched off (power switch)",
            DeviceModeRegister => "Switched off (device mode register)",
            RemoteInput => "Remote input",
            ProtectionActive => "Protection active",
            Paygo => "Paygo",
            Bms => "BMS",
            EngineShutdown => "Engine shutdown detection",
            AnalysingInputVoltage => "Analysing input voltage",
        }
    }
} // }}}

// MpptState {{{
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MpptState {
    Off = 0,
    Limited = 1,
    Tracking = 2,
}

impl MpptState {
    pub fn from_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().and_then(|c| Self::try_from(c).ok())
    }

    pub fn description(&self) -> &'static str {
        match self {
            MpptState::Off => "Off",
            MpptState::Limited => "Voltage or current limited",
            MpptState::Tracking => "MPP Tracker active",
        }
    }
} // }}}

pub fn error_description(code: i64) -> Option<&'static str> {
    let text = match code {
        0 => "No error",
        2 => "Battery voltage too high",
        17 => "Charger temperature too high",
        18 => "Charger over current",
        19 => "Charger current reversed",
        20 => "Bulk time limit exceeded",
        21 => "Current sensor issue (sensor bias/sensor broken)",
        26 => "Terminals overheated",
        28 => "Converter issue (dual converter models only)",
        33 => "Input voltage too high (solar panel)",
        34 => "Input current too high (solar panel)",
        38 => "Input shutdown (due to excessive battery voltage)",
        39 => "Input shutdown (due to current flow during off mode)",
        40 => "Input",
        65 => "Lost communication with one of devices",
        67 => "Synchronised charging device configuration issue",
        68 => "BMS connection lost",
        116 => "Factory calibration data lost",
        117 => "Invalid/incompatible firmware",
        118 => "User settings invalid",
        _ => return None,
    };
    Some(text)
}

pub fn product_name(pid: i64) -> Option<&'static str> {
    let name = match pid {
        0x0300 => "BlueSolar MPPT 70|15",
        0xA040 => "BlueSolar MPPT 75|50",
        0xA041 => "BlueSolar MPPT 150|35",
        0xA042 => "BlueSolar MPPT 75|15",
        0xA043 => "BlueSolar MPPT 100|15",
        0xA044 => "BlueSolar MPPT 100|30",
        0xA045 => "BlueSolar MPPT 100|50",
        0xA046 => "BlueSolar MPPT 100|70",
        0xA047 => "BlueSolar MPPT 150|100",
        0xA049 => "BlueSolar MPPT 100|50 rev2",
        0xA04A => "BlueSolar MPPT 100|30 rev2",
        0xA04B => "BlueSolar MPPT 150|35 rev2",
        0xA04C => "BlueSolar MPPT 75|10",
        0xA04D => "BlueSolar MPPT 150|45",
        0xA04E => "BlueSolar MPPT 150|60",
        0xA04F => "BlueSolar MPPT 150|85",
        0xA050 => "SmartSolar MPPT 250|100",
        0xA051 => "SmartSolar MPPT 150|100",
        0xA052 => "SmartSolar MPPT 150|85",
        0xA053 => "SmartSolar MPPT 75|15",
        0xA054 => "SmartSolar MPPT 75|10",
        0xA055 => "SmartSolar MPPT 100|15",
        0xA056 => "SmartSolar MPPT 100|30",
        0xA057 => "SmartSolar MPPT 100|50",
        0xA058 => "SmartSolar MPPT 100|35",
        0xA059 => "SmartSolar MPPT 150|10 rev2",
        0xA05A => "SmartSolar MPPT 150|85 rev2",
        0xA05B => "SmartSolar MPPT 250|70",
        0xA05C => "SmartSolar MPPT 250|85",
        0xA05D => "SmartSolar MPPT 250|60",
        0xA05E => "SmartSolar MPPT 250|45",
        0xA05F => "SmartSolar MPPT 100|20",
        0xA060 => "SmartSolar MPPT 100|20 48V",
        0xA061 => "SmartSolar MPPT 150|45",
        0xA062 => "SmartSolar MPPT 150|60",
        0xA063 => "SmartSolar MPPT 150|70",
        0xA064 => "SmartSolar MPPT 250|85 rev2",
        0xA065 => "SmartSolar MPPT 250|100 rev2",
        0xA066 => "BlueSolar MPPT 100|20",
        0xA067 => "BlueSolar MPPT 100|20 48V",
        0xA068 => "SmartSolar MPPT 250|60 rev2",
        0xA069 => "SmartSolar MPPT 250|70 rev2",
        0xA06A => "SmartSolar MPPT 150|45 rev2",
        0xA06B => "SmartSolar MPPT 150|60 rev2",
        0xA06C => "SmartSolar MPPT 150|70 rev2",
        0xA06D => "SmartSolar MPPT 150|85 rev3",
        0xA06E => "SmartSolar MPPT 150|100 rev3",
        0xA06F => "BlueSolar MPPT 150|45 rev2",
        0xA070 => "BlueSolar MPPT 150|60 rev2",
        0xA071 => "BlueSolar MPPT 150|70 rev2",
        0xA102 => "SmartSolar MPPT VE.Can 150|70",
        0xA103 => "SmartSolar MPPT VE.Can 150|45",
        0xA104 => "SmartSolar MPPT VE.Can 150|60",
        0xA105 => "SmartSolar MPPT VE.Can 150|85",
        0xA106 => "SmartSolar MPPT VE.Can 150|100",
        0xA107 => "SmartSolar MPPT VE.Can 250|45",
        0xA108 => "SmartSolar MPPT VE.Can 250|60",
        0xA109 => "SmartSolar MPPT VE.Can 250|80",
        0xA10A => "SmartSolar MPPT VE.Can 250|85",
        0xA10B => "SmartSolar MPPT VE.Can 250|100",
        0xA10C => "SmartSolar MPPT VE.Can 150|70 rev2",
        0xA10D => "SmartSolar MPPT VE.Can 150|85 rev2",
        0xA10E => "SmartSolar MPPT VE.Can 150|100 rev2",
        0xA10F => "BlueSolar MPPT VE.Can 150|100",
        0xA112 => "BlueSolar MPPT VE.Can 250|70",
        0xA113 => "BlueSolar MPPT VE.Can 250|100",
        0xA114 => "SmartSolar MPPT VE.Can 250|70 rev2",
        0xA115 => "SmartSolar MPPT VE.Can 250|100 rev2",
        0xA116 => "SmartSolar MPPT VE.Can 250|85 rev2",
        _ => return None,
    };
    Some(name)
}
