//! Heading arithmetic on the 0/360 circle.
//!
//! Every comparison or blend of two headings goes through the helpers here
//! so nothing ever subtracts raw values across the wrap boundary.

/// Wrap any finite angle into [0, 360).
pub fn normalize_deg(deg: f32) -> f32 {
    let m = deg.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs.
    if m >= 360.0 { 0.0 } else { m }
}

/// Signed shortest distance from `from` to `to`, in [-180, 180].
pub fn shortest_distance(from: f32, to: f32) -> f32 {
    let mut diff = normalize_deg(to) - normalize_deg(from);
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff < -180.0 {
        diff += 360.0;
    }
    diff
}

/// Nearest integer degree in 0..=359 (359.6 rounds to 0, not 360).
pub fn quantize_deg(deg: f32) -> u16 {
    (normalize_deg(deg).round() as u16) % 360
}

/// Circular distance between two integer headings, 0..=180.
pub fn integer_distance(a: u16, b: u16) -> u16 {
    let d = (i32::from(a % 360) - i32::from(b % 360)).rem_euclid(360) as u16;
    d.min(360 - d)
}

/// Heading of a 2-D field vector in [0, 360).
pub fn angle_from_xy(x: f32, y: f32) -> f32 {
    normalize_deg(y.atan2(x).to_degrees())
}

/// Unit vector for a heading.
pub fn xy_from_angle(deg: f32) -> (f32, f32) {
    let rad = deg.to_radians();
    (rad.cos(), rad.sin())
}

/// Weighted mean of two headings computed on unit vectors.
///
/// `weight` is the share given to `new` (0..=1).  Diametrically opposed
/// inputs have no defined mean; `old` is returned unchanged.
pub fn circular_blend(old: f32, new: f32, weight: f32) -> f32 {
    let (ox, oy) = xy_from_angle(old);
    let (nx, ny) = xy_from_angle(new);
    let x = ox * (1.0 - weight) + nx * weight;
    let y = oy * (1.0 - weight) + ny * weight;
    if x.abs() < f32::EPSILON && y.abs() < f32::EPSILON {
        return normalize_deg(old);
    }
    angle_from_xy(x, y)
}

/// Loop-level heading filter.
///
/// Applies `alpha` to the shortest-path difference and discards any
/// single-step move of `max_jump_deg` or more as a glitch.  The first
/// accepted reading seeds the filter.
#[derive(Debug, Clone, Copy)]
pub struct HeadingFilter {
    alpha: f32,
    max_jump_deg: f32,
    value: Option<f32>,
}

impl HeadingFilter {
    pub fn new(alpha: f32, max_jump_deg: f32) -> Self {
        Self {
            alpha,
            max_jump_deg,
            value: None,
        }
    }

    /// Feed a reading.  Returns `false` when it was rejected as a jump.
    pub fn push(&mut self, reading_deg: f32) -> bool {
        let Some(current) = self.value else {
            self.value = Some(normalize_deg(reading_deg));
            return true;
        };
        let diff = shortest_distance(current, reading_deg);
        if diff.abs() >= self.max_jump_deg {
            return false;
        }
        self.value = Some(normalize_deg(current + diff * self.alpha));
        true
    }

    /// Filtered heading, 0.0 until the first reading.
    pub fn value(&self) -> f32 {
        self.value.unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
