//! Pose types carried by trajectory commands and status.
//!
//! A [`Pose`] is the nine-axis world position (XYZ translation plus ABC
//! rotary and UVW secondary linear axes). [`Cartesian`] is a plain 3-vector
//! used for arc centers and normals.

use serde::{Deserialize, Serialize};

/// Cartesian 3-vector [user units].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// True if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Nine-axis pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// XYZ translation.
    pub tran: Cartesian,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl Pose {
    /// Number of scalar components.
    pub const COMPONENTS: usize = 9;

    /// Pose with only the translation set.
    pub const fn from_xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            tran: Cartesian::new(x, y, z),
            a: 0.0,
            b: 0.0,
            c: 0.0,
            u: 0.0,
            v: 0.0,
            w: 0.0,
        }
    }

    /// Components in X Y Z A B C U V W order.
    pub const fn components(&self) -> [f64; Self::COMPONENTS] {
        [
            self.tran.x,
            self.tran.y,
            self.tran.z,
            self.a,
            self.b,
            self.c,
            self.u,
            self.v,
            self.w,
        ]
    }

    /// Build from up to nine components; missing trailing components are zero.
    ///
    /// Returns `None` if more than nine values are given.
    pub fn from_components(values: &[f64]) -> Option<Self> {
        if values.len() > Self::COMPONENTS {
            return None;
        }
        let mut c = [0.0; Self::COMPONENTS];
        c[..values.len()].copy_from_slice(values);
        Some(Self {
            tran: Cartesian::new(c[0], c[1], c[2]),
            a: c[3],
            b: c[4],
            c: c[5],
            u: c[6],
            v: c[7],
            w: c[8],
        })
    }

    /// True if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_order() {
        let p = Pose::from_components(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]).unwrap();
        assert_eq!(p.tran, Cartesian::new(1.0, 2.0, 3.0));
        assert_eq!(p.c, 6.0);
        assert_eq!(p.w, 9.0);
        assert_eq!(p.components()[4], 5.0);
    }

    #[test]
    fn short_component_list_pads_with_zero() {
        let p = Pose::from_components(&[1.0, 2.0]).unwrap();
        assert_eq!(p, Pose::from_xyz(1.0, 2.0, 0.0));
        assert!(Pose::from_components(&[0.0; 10]).is_none());
    }

    #[test]
    fn finiteness_covers_every_axis() {
        assert!(Pose::default().is_finite());
        let mut p = Pose::default();
        p.v = f64::NAN;
        assert!(!p.is_finite());
        assert!(!Cartesian::new(0.0, f64::INFINITY, 0.0).is_finite());
    }
}
