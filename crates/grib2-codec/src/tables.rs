//! Parameter short names for the fields this codec reads and writes.
//!
//! Only used for logging and error messages; field selection works on the
//! numeric codes.

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Short name of a parameter, or `VAR{d}_{c}_{n}` when unknown.
pub fn parameter_short_name(key: ParamKey) -> String {
    let name = match key {
        (0, 1, 8) => "APCP",
        (0, 7, 193) => "4LFTX",
        (0, 7, 199) => "MXUPHL",
        (0, 16, 195) => "REFD",
        (0, 16, 196) => "REFC",
        (0, 19, 2) => "TSTM",
        (0, 19, 197) => "PTOR",
        (0, 19, 198) => "PHAIL",
        (0, 19, 199) => "PWIND",
        (d, c, n) => return format!("VAR{}_{}_{}", d, c, n),
    };
    name.to_string()
}
