//! Text fixtures for land LUT and ATCF track inputs.

/// Land LUT with a 2x2 grid covering the globe at 180 degree spacing.
///
/// Rows run north from -90. Column 0 (0E) holds 100 km, column 1 (180E)
/// holds 500 km in both rows, so any blend across the date line is easy
/// to spot.
pub const GLOBAL_2X2_LUT: &str = "0.0 180.0 180.0 2 0 -90.0 90.0 180.0 2\n\
                                  100.0 500.0\n\
                                  100.0 500.0\n";

/// Land LUT with a 4x3 grid at 90 degree spacing and values 1..=12.
pub const SMALL_LUT: &str = "0.0 270.0 90.0 4 0 -90.0 90.0 90.0 3\n\
                             1 2 3 4\n\
                             5 6 7 8\n\
                             9 10 11 12\n";

/// One a-deck track record.
#[derive(Debug, Clone)]
pub struct AdeckRecord<'a> {
    pub basin: &'a str,
    pub storm_number: u32,
    /// `YYYYMMDDHH`
    pub init_time: &'a str,
    pub tech: &'a str,
    pub tau: i32,
    /// Tenths of a degree, positive north.
    pub lat_tenths: i32,
    /// Tenths of a degree, positive east.
    pub lon_tenths: i32,
    pub vmax_kt: i32,
    pub mslp_hpa: i32,
    pub storm_name: &'a str,
}

impl AdeckRecord<'_> {
    /// Render the record as a comma-delimited a-deck line.
    pub fn to_line(&self) -> String {
        let lat = format!(
            "{}{}",
            self.lat_tenths.abs(),
            if self.lat_tenths < 0 { 'S' } else { 'N' }
        );
        let lon = format!(
            "{}{}",
            self.lon_tenths.abs(),
            if self.lon_tenths < 0 { 'W' } else { 'E' }
        );
        format!(
            "{}, {:02}, {}, 03, {}, {:3}, {:>4}, {:>5}, {:3}, {:4}, XX,  34, NEQ,    0,    0,    0,    0,    0,    0,   0,   0,   0,    ,   0,    ,   0,   0, {}",
            self.basin,
            self.storm_number,
            self.init_time,
            self.tech,
            self.tau,
            lat,
            lon,
            self.vmax_kt,
            self.mslp_hpa,
            self.storm_name
        )
    }
}

/// A short AVNO forecast for AL09 initialized 2022092600, with one line
/// from another technique mixed in.
pub fn sample_adeck() -> String {
    let base = AdeckRecord {
        basin: "AL",
        storm_number: 9,
        init_time: "2022092600",
        tech: "AVNO",
        tau: 0,
        lat_tenths: 220,
        lon_tenths: -828,
        vmax_kt: 75,
        mslp_hpa: 983,
        storm_name: "IAN",
    };
    let lines = [
        base.to_line(),
        AdeckRecord {
            tau: 6,
            lat_tenths: 228,
            lon_tenths: -832,
            ..base.clone()
        }
        .to_line(),
        AdeckRecord {
            tech: "OFCL",
            tau: 6,
            lat_tenths: 300,
            lon_tenths: -700,
            ..base.clone()
        }
        .to_line(),
        AdeckRecord {
            tau: 12,
            lat_tenths: 236,
            lon_tenths: -836,
            ..base.clone()
        }
        .to_line(),
    ];
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
