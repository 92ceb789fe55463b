//! Pointing and capacity calculations.
//!
//! Contains helpers for:
//! - Building the receive-plane basis perpendicular to the link boresight
//! - Projecting the adjusted pose of a link into a transmit spot offset
//! - Normalised capacity from footprint overlap
//!
//! Units:
//! - Distance: meters
//! - Angles: degrees in poses, radians in the returned roll

use nalgebra::Vector3;

use super::geometry::Polygon;
use super::types::{Orientation, Point, Position};

const DEGENERATE_NORM: f64 = 1e-12;

/// Orthonormal in-plane axes of the receive plane.
///
/// # Parameters
///
/// * `boresight` - Direction from transmitter to receiver (any length)
///
/// # Returns
///
/// `(u, v)` where `u = ẑ × b̂` is horizontal and `v = b̂ × u`. A zero
/// boresight is treated as +x, a vertical one takes +x as `u`.
pub fn receive_plane_basis(boresight: &Position) -> (Position, Position) {
    let b = boresight.try_normalize(DEGENERATE_NORM).unwrap_or_else(Vector3::x);
    let u = Vector3::z().cross(&b).try_normalize(DEGENERATE_NORM).unwrap_or_else(Vector3::x);
    let v = b.cross(&u);
    (u, v)
}

/// Transmit spot center on the receive plane and its roll in radians.
///
/// # Formula
///
/// ```text
/// c = (D × tan(yaw_adj) − d_adj · u, D × tan(pitch_adj) − d_adj · v)
/// ```
///
/// Where `D` is the communication distance, `d_adj` the adjusted relative
/// displacement since the last alignment and `(u, v)` the receive-plane basis
/// of the reference boresight. The receiver moving along `u` shifts the spot
/// the opposite way in receiver coordinates.
///
/// # Parameters
///
/// * `boresight` - Relative position captured at the last alignment
/// * `displacement` - Adjusted relative position
/// * `rotation` - Adjusted relative orientation (degrees)
/// * `distance` - Current communication distance
pub fn pointing_offset(boresight: &Position, displacement: &Position, rotation: &Orientation, distance: f64) -> (Point, f64) {
    let (u, v) = receive_plane_basis(boresight);
    let x = distance * rotation.yaw.to_radians().tan() - displacement.dot(&u);
    let y = distance * rotation.pitch.to_radians().tan() - displacement.dot(&v);
    (Point::new(x, y), rotation.roll.to_radians())
}

/// Overlap of the transmit spot and receive aperture relative to π·r².
///
/// Not clamped: a polygon approximation may exceed 1 by rounding error.
pub fn normalized_capacity(transmit: &Polygon, receive: &Polygon, aperture_area: f64) -> f64 {
    if aperture_area <= 0.0 {
        return 0.0;
    }
    transmit.intersection(receive).area() / aperture_area
}
