use std::fmt;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

pub const ANN_ARBOR: Coordinates = Coordinates {
    lat: 42.2808,
    lon: -83.7430,
};

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Resolve a ZIP code to coordinates. Unknown codes resolve to Ann Arbor.
pub fn coordinates_for_zip(zip: &str) -> Coordinates {
    match zip {
        "48103" | "48104" | "48105" => ANN_ARBOR,
        "48108" => Coordinates {
            lat: 42.2320,
            lon: -83.7315,
        },
        "48109" => Coordinates {
            lat: 42.2780,
            lon: -83.7382,
        },
        "48197" | "48198" => Coordinates {
            lat: 42.2411,
            lon: -83.6130,
        },
        _ => ANN_ARBOR,
    }
}
