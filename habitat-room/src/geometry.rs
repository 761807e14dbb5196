//! Minimal vector/quaternion math for plane matching.
//!
//! Only what reconciliation needs — full linear algebra lives with the
//! rendering layer, which is not part of this crate.

use serde::{Deserialize, Serialize};

/// A 3D vector. Right-handed coordinate system, Y up, units in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance between two points.
    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Returns a unit-length copy. Zero-length vectors are returned unchanged.
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            return *self;
        }
        Vec3::new(self.x / len, self.y / len, self.z / len)
    }

    /// Rotates this vector by a quaternion (v' = q * v * q⁻¹).
    pub fn rotated_by(&self, q: &Quat) -> Vec3 {
        let qx2 = q.x * 2.0;
        let qy2 = q.y * 2.0;
        let qz2 = q.z * 2.0;
        let qxqx2 = q.x * qx2;
        let qxqy2 = q.x * qy2;
        let qxqz2 = q.x * qz2;
        let qyqy2 = q.y * qy2;
        let qyqz2 = q.y * qz2;
        let qzqz2 = q.z * qz2;
        let qwqx2 = q.w * qx2;
        let qwqy2 = q.w * qy2;
        let qwqz2 = q.w * qz2;

        Vec3::new(
            self.x * (1.0 - (qyqy2 + qzqz2)) + self.y * (qxqy2 - qwqz2) + self.z * (qxqz2 + qwqy2),
            self.x * (qxqy2 + qwqz2) + self.y * (1.0 - (qxqx2 + qzqz2)) + self.z * (qyqz2 - qwqx2),
            self.x * (qxqz2 - qwqy2) + self.y * (qyqz2 + qwqx2) + self.z * (1.0 - (qxqx2 + qyqy2)),
        )
    }
}

/// A quaternion. Expected (but not enforced) to be unit length when used
/// as an orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Four-component dot product. For unit quaternions, |dot| near 1 means
    /// the rotations are nearly identical (q and -q encode the same rotation).
    pub fn dot(&self, other: &Quat) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// The plane normal this orientation encodes: the world up vector
    /// rotated by the quaternion. Detected planes face outward.
    pub fn to_normal(&self) -> Vec3 {
        Vec3::UP.rotated_by(self)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Quat::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn identity_rotation_is_noop() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let r = v.rotated_by(&Quat::IDENTITY);
        assert!((r.x - 1.0).abs() < 1e-6);
        assert!((r.y - 2.0).abs() < 1e-6);
        assert!((r.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn half_turn_about_z_flips_up() {
        // 180° about Z: (0, 0, 1, 0)
        let q = Quat::new(0.0, 0.0, 1.0, 0.0);
        let n = q.to_normal();
        assert!((n.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn quat_dot_detects_closeness() {
        let a = Quat::IDENTITY;
        // tiny rotation about X
        let b = Quat::new(0.001, 0.0, 0.0, 0.9999995);
        assert!(a.dot(&b) > 0.999);
    }

    #[test]
    fn normalized_has_unit_length() {
        let v = Vec3::new(0.0, 3.0, 4.0).normalized();
        assert!((v.length() - 1.0).abs() < 1e-6);
        // zero vector stays zero rather than becoming NaN
        let z = Vec3::ZERO.normalized();
        assert_eq!(z, Vec3::ZERO);
    }
}
