//! Antenna footprint model.
//!
//! Every node owns one antenna model. The transmitter's footprint is the
//! wavefront spot it projects onto the receive plane; the receiver's footprint
//! is its circular aperture centred on the boresight. Both are polygons so the
//! link can intersect them.

use super::geometry::Polygon;
use super::types::Point;

/// Vertices used for circular footprints unless configured otherwise.
pub const DEFAULT_FOOTPRINT_SEGMENTS: usize = 64;

#[derive(Debug, Clone)]
pub struct AntennaModel {
    /// Full transmit beamwidth in degrees.
    pub beamwidth_deg: f64,
    /// Aperture radius in meters.
    pub radius: f64,
    pub segments: usize,
    footprint: Polygon,
}

impl AntennaModel {
    /// New antenna with its footprint initialised to the aperture.
    pub fn new(beamwidth_deg: f64, radius: f64, segments: usize) -> Self {
        let mut antenna = Self {
            beamwidth_deg,
            radius,
            segments,
            footprint: Polygon::empty(),
        };
        antenna.update_aperture();
        antenna
    }

    /// π·r², the normalisation constant for capacity.
    pub fn aperture_area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }

    /// Radius of the transmit spot after the link range drifted by
    /// `range_drift` meters since the last alignment.
    ///
    /// # Formula
    ///
    /// ```text
    /// R(Δd) = r + |Δd| × tan(θ / 2)
    /// ```
    ///
    /// Where θ is the beamwidth and r the aperture radius. Alignment focuses
    /// the beam onto the receive aperture, so at the aligned range the spot
    /// matches the aperture exactly and grows with the beam divergence as the
    /// range moves away from it.
    pub fn spot_radius(&self, range_drift: f64) -> f64 {
        let half_angle = (self.beamwidth_deg / 2.0).to_radians();
        self.radius + range_drift.abs() * half_angle.tan()
    }

    /// Place the transmit spot at `center` on the receive plane and rotate it
    /// by `roll_rad` about the boresight point.
    ///
    /// # Parameters
    ///
    /// * `center` - Spot center in receive-plane coordinates
    /// * `roll_rad` - Adjusted relative roll
    /// * `range_drift` - Current distance minus the distance at the last alignment
    pub fn update_wavefront(&mut self, center: Point, roll_rad: f64, range_drift: f64) {
        let spot = Polygon::circle(Point::default(), self.spot_radius(range_drift), self.segments).translate(center.x, center.y);
        self.footprint = spot.rotate_about(Point::default(), roll_rad);
    }

    /// Reset the footprint to the receive aperture centred on the boresight.
    pub fn update_aperture(&mut self) {
        self.footprint = Polygon::circle(Point::default(), self.radius, self.segments);
    }

    pub fn footprint(&self) -> &Polygon {
        &self.footprint
    }
}
