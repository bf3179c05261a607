pub const MEV: f64 = 1.0;
pub const KEV: f64 = 1.0e-3 * MEV;
pub const EV: f64 = 1.0e-6 * MEV;

pub const MM: f64 = 1.0;
pub const M: f64 = 1.0e3 * MM;

pub const NS: f64 = 1.0;
pub const US: f64 = 1.0e3 * NS;
pub const MS: f64 = 1.0e6 * NS;
pub const S: f64 = 1.0e9 * NS;

/// Converts an engine energy into electron-volts (the bookkeeping unit of the energy maps).
pub fn to_ev(energy: f64) -> f64 {
    energy / EV
}
