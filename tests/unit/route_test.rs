//! Unit tests for route lookup and GPX course import.

use kickr_racer::world::import::{import_gpx, ImportError};
use kickr_racer::world::route::{haversine_km, Route, RouteError, RouteSegment, KM_TO_MILES};

fn segment(start: f64, length: f64, gradient: f64, elevation: f64) -> RouteSegment {
    RouteSegment {
        start_distance: start,
        segment_length: length,
        gradient,
        elevation,
    }
}

fn hilly() -> Route {
    Route::new(vec![
        segment(0.0, 1.0, 0.0, 100.0),
        segment(1.0, 0.5, 6.0, 100.0),
        segment(1.5, 1.0, -3.0, 148.0),
        segment(2.5, 0.0, 0.0, 100.0),
    ])
    .unwrap()
}

fn gpx_document(points: &[(f64, f64, Option<f64>)]) -> String {
    let trkpts: String = points
        .iter()
        .map(|(lat, lon, ele)| match ele {
            Some(ele) => format!(
                r#"<trkpt lat="{}" lon="{}"><ele>{}</ele></trkpt>"#,
                lat, lon, ele
            ),
            None => format!(r#"<trkpt lat="{}" lon="{}"></trkpt>"#, lat, lon),
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>River Loop</name>
    <trkseg>{}</trkseg>
  </trk>
</gpx>"#,
        trkpts
    )
}

#[test]
fn test_gradient_lookup_by_distance() {
    let route = hilly();
    assert_eq!(route.total_distance(), 2.5);
    assert_eq!(route.gradient_at(0.0), Some(0.0));
    assert_eq!(route.gradient_at(1.0), Some(6.0));
    assert_eq!(route.gradient_at(1.49), Some(6.0));
    assert_eq!(route.gradient_at(2.0), Some(-3.0));
}

#[test]
fn test_finish_line_uses_terminal_segment() {
    assert_eq!(hilly().gradient_at(2.5), Some(0.0));
}

#[test]
fn test_lookup_outside_route() {
    let route = hilly();
    assert_eq!(route.gradient_at(-0.01), None);
    assert_eq!(route.gradient_at(2.51), None);
}

#[test]
fn test_elevation_interpolates() {
    let route = hilly();
    assert!((route.elevation_at(1.25).unwrap() - 124.0).abs() < 1e-9);
}

#[test]
fn test_gap_between_segments_rejected() {
    let result = Route::new(vec![segment(0.0, 1.0, 0.0, 0.0), segment(1.2, 0.0, 0.0, 0.0)]);
    assert_eq!(result, Err(RouteError::NonMonotonic { index: 1 }));
}

#[test]
fn test_empty_route_rejected() {
    assert_eq!(Route::new(Vec::new()), Err(RouteError::Empty));
}

#[test]
fn test_haversine_one_degree_of_latitude() {
    let km = haversine_km(0.0, 0.0, 1.0, 0.0);
    assert!((km - 111.195).abs() < 0.01);
}

#[test]
fn test_import_gpx_builds_route() {
    let doc = gpx_document(&[
        (45.0, 7.0, Some(200.0)),
        (45.01, 7.0, Some(222.239)),
        (45.02, 7.0, Some(222.239)),
    ]);

    let imported = import_gpx(doc.as_bytes()).unwrap();
    assert_eq!(imported.name.as_deref(), Some("River Loop"));

    let route = imported.route;
    let leg_miles = haversine_km(45.0, 7.0, 45.01, 7.0) * KM_TO_MILES;
    assert_eq!(route.segments().len(), 3);
    assert!((route.total_distance() - 2.0 * leg_miles).abs() < 1e-9);

    // 22.239 m over ~1111.95 m of road
    let climb = route.gradient_at(0.1).unwrap();
    assert!((climb - 2.0).abs() < 0.01, "got {}", climb);
    assert_eq!(route.gradient_at(leg_miles * 1.5), Some(0.0));
}

#[test]
fn test_import_skips_points_without_elevation() {
    let doc = gpx_document(&[
        (45.0, 7.0, Some(200.0)),
        (45.005, 7.0, None),
        (45.01, 7.0, Some(200.0)),
    ]);

    let route = import_gpx(doc.as_bytes()).unwrap().route;
    assert_eq!(route.segments().len(), 2);
}

#[test]
fn test_import_without_any_elevation() {
    let doc = gpx_document(&[(45.0, 7.0, None), (45.01, 7.0, None)]);
    assert!(matches!(
        import_gpx(doc.as_bytes()),
        Err(ImportError::NoElevation)
    ));
}

#[test]
fn test_import_single_point() {
    let doc = gpx_document(&[(45.0, 7.0, Some(10.0))]);
    assert!(matches!(
        import_gpx(doc.as_bytes()),
        Err(ImportError::TooFewPoints { count: 1 })
    ));
}

#[test]
fn test_import_malformed_document() {
    assert!(matches!(
        import_gpx(b"<gpx><trk>"),
        Err(ImportError::ParseError(_))
    ));
}
