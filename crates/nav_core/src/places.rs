//! Named Lagos locations accepted wherever a coordinate is expected.

use crate::error::NavError;
use crate::geo::Coordinate;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Place {
    pub name: &'static str,
    pub position: Coordinate,
}

pub const KNOWN_PLACES: &[Place] = &[
    Place {
        name: "Victoria Island",
        position: Coordinate::new(6.4541, 3.3947),
    },
    Place {
        name: "Lekki Phase 1",
        position: Coordinate::new(6.4691, 3.5851),
    },
    Place {
        name: "Ikoyi",
        position: Coordinate::new(6.4590, 3.4365),
    },
    Place {
        name: "Banana Island",
        position: Coordinate::new(6.4678, 3.4498),
    },
    Place {
        name: "Eko Atlantic",
        position: Coordinate::new(6.4089, 3.4068),
    },
    Place {
        name: "CMS (Marina)",
        position: Coordinate::new(6.4503, 3.3958),
    },
];

/// Case-insensitive lookup; surrounding whitespace is ignored.
pub fn find_place(name: &str) -> Option<&'static Place> {
    let wanted = name.trim();
    KNOWN_PLACES
        .iter()
        .find(|place| place.name.eq_ignore_ascii_case(wanted))
}

/// Accept either a `"lat,lon"` pair or a known place name.
pub fn resolve_endpoint(raw: &str) -> Result<Coordinate, NavError> {
    if let Some(place) = find_place(raw) {
        return Ok(place.position);
    }
    Coordinate::parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let place = find_place("  banana island ").expect("known");
        assert_eq!(place.position, Coordinate::new(6.4678, 3.4498));
        assert!(find_place("Yaba").is_none());
    }

    #[test]
    fn resolves_names_and_pairs() {
        assert_eq!(
            resolve_endpoint("victoria island").expect("name"),
            Coordinate::new(6.4541, 3.3947)
        );
        assert_eq!(
            resolve_endpoint("6.45,3.40").expect("pair"),
            Coordinate::new(6.45, 3.40)
        );
        assert!(matches!(
            resolve_endpoint("Yaba"),
            Err(NavError::InvalidCoordinate { .. })
        ));
    }
}
