use core::ops;
use core::fmt;

use crate::vec::Vec3;
use crate::mat::Mat4;

use bytemuck::{Pod, Zeroable};

/// Rotation as a unit quaternion. Operations that assume unit norm
/// (`normalized`, slerp, the Euler conversions) normalize their inputs
/// first, so a denormalized value degrades gracefully instead of
/// propagating garbage.
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Tolerance for the degenerate-input guards below.
    pub const EPSILON: f32 = 1e-6;

    #[inline]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Real part.
    #[inline]
    pub fn re(self) -> f32 {
        self.w
    }

    /// Imaginary part.
    #[inline]
    pub fn im(self) -> Vec3 {
        Vec3 { x: self.x, y: self.y, z: self.z }
    }

    #[inline]
    pub fn from_slice(a: &[f32; 4]) -> Self {
        unsafe {
            std::mem::transmute_copy::<[f32; 4], Self>(a)
        }
    }

    #[inline]
    pub fn to_slice(self) -> [f32; 4] {
        unsafe {
            std::mem::transmute_copy::<Self, [f32; 4]>(&self)
        }
    }

    #[inline]
    pub fn dot(a: Quat, b: Quat) -> f32 {
        a.x * b.x + a.y * b.y + a.z * b.z + a.w * b.w
    }

    #[inline]
    pub fn conj(self) -> Self {
        Quat {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: self.w,
        }
    }

    /// This rotation with unit norm; a near-zero quaternion normalizes to
    /// the identity.
    #[inline]
    pub fn normalized(self) -> Self {
        let mag = Quat::dot(self, self).sqrt();
        if mag < Self::EPSILON {
            return Self::IDENTITY;
        }
        let i = 1.0 / mag;
        Quat::new(self.x * i, self.y * i, self.z * i, self.w * i)
    }

    /// The reverse rotation; a near-zero quaternion has no meaningful
    /// inverse and maps to the identity.
    #[inline]
    pub fn inverse(self) -> Self {
        let sqr_mag = Quat::dot(self, self);
        if sqr_mag < Self::EPSILON {
            return Self::IDENTITY;
        }
        (1.0 / sqr_mag) * self.conj()
    }

    /// Rotation-aware equality: true when the two quaternions represent
    /// the same orientation (their dot product is within `EPSILON` of
    /// plus or minus one).
    #[inline]
    pub fn approx_eq(self, rhs: Quat) -> bool {
        Quat::dot(self, rhs).abs() > 1.0 - Self::EPSILON
    }

    /// Angle between two rotations, in degrees.
    pub fn angle(a: Quat, b: Quat) -> f32 {
        let dot = Quat::dot(a, b).abs().clamp(0.0, 1.0);
        if dot > 1.0 - Self::EPSILON {
            0.0
        } else {
            (dot.acos() * 2.0).to_degrees()
        }
    }

    /// The rotation taking the direction `from` onto the direction `to`.
    /// Near-parallel inputs yield the identity; near-opposite inputs yield a
    /// 180 degree turn about an axis orthogonal to `from`.
    pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
        let from = from.normalized();
        let to = to.normalized();
        let dot = from.dot(to);

        if dot > 1.0 - Self::EPSILON {
            return Self::IDENTITY;
        }

        if dot < -1.0 + Self::EPSILON {
            // opposite directions: any axis orthogonal to `from` works
            let mut axis = Vec3::RIGHT.cross(from);
            if axis.sqr_magnitude() < Self::EPSILON {
                axis = from.cross(Vec3::UP);
            }
            return Self::angle_axis(180.0, axis);
        }

        let axis = from.cross(to);
        let angle = dot.clamp(-1.0, 1.0).acos();
        Self::angle_axis(angle.to_degrees(), axis)
    }

    /// Rotation of `degrees` about `axis`. A near-zero axis yields the
    /// identity.
    pub fn angle_axis(degrees: f32, axis: Vec3) -> Quat {
        if axis.sqr_magnitude() < Self::EPSILON {
            return Self::IDENTITY;
        }
        let axis = axis.normalized();

        let half = degrees.to_radians() * 0.5;
        let sin = half.sin();

        Quat::new(axis.x * sin, axis.y * sin, axis.z * sin, half.cos())
    }

    /// This rotation as an angle (degrees) and a unit axis. A rotation
    /// within `EPSILON` of the identity reports angle 0 about `RIGHT`.
    pub fn to_angle_axis(self) -> (f32, Vec3) {
        let q = self.normalized();

        if q.x.abs() < Self::EPSILON && q.y.abs() < Self::EPSILON && q.z.abs() < Self::EPSILON {
            return (0.0, Vec3::RIGHT);
        }

        let angle = 2.0 * q.w.clamp(-1.0, 1.0).acos();
        let axis_mag = (1.0 - q.w * q.w).max(0.0).sqrt();

        let axis = if axis_mag < Self::EPSILON {
            Vec3::RIGHT
        } else {
            Vec3::new(q.x / axis_mag, q.y / axis_mag, q.z / axis_mag)
        };

        (angle.to_degrees(), axis)
    }

    /// Rotation from Euler angles in degrees, applied z (roll), then
    /// x (pitch), then y (yaw).
    pub fn euler(degrees: Vec3) -> Quat {
        Self::from_euler_rad(degrees * (core::f32::consts::PI / 180.0))
    }

    /// Euler angles of this rotation in degrees, each axis wrapped into
    /// `[0, 360)`. Inverse of [`euler`](Self::euler) for pitch inside
    /// (-90, 90) degrees.
    pub fn euler_angles(self) -> Vec3 {
        let e = self.to_euler_rad() * (180.0 / core::f32::consts::PI);
        Vec3::new(
            e.x.rem_euclid(360.0),
            e.y.rem_euclid(360.0),
            e.z.rem_euclid(360.0),
        )
    }

    fn from_euler_rad(rad: Vec3) -> Quat {
        let (sx, cx) = (rad.x * 0.5).sin_cos();
        let (sy, cy) = (rad.y * 0.5).sin_cos();
        let (sz, cz) = (rad.z * 0.5).sin_cos();

        let qx = Quat::new(sx, 0.0, 0.0, cx);
        let qy = Quat::new(0.0, sy, 0.0, cy);
        let qz = Quat::new(0.0, 0.0, sz, cz);

        qy * qx * qz
    }

    fn to_euler_rad(self) -> Vec3 {
        let q = self.normalized();

        // pitch leaves asin's range at the poles; clamping keeps the
        // remaining two angles finite there
        let sin_pitch = 2.0 * (q.w * q.x - q.y * q.z);
        let x = sin_pitch.clamp(-1.0, 1.0).asin();

        let y = (2.0 * (q.x * q.z + q.w * q.y))
            .atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
        let z = (2.0 * (q.x * q.y + q.w * q.z))
            .atan2(1.0 - 2.0 * (q.x * q.x + q.z * q.z));

        Vec3::new(x, y, z)
    }

    /// The rotation whose forward axis points along `forward` and whose up
    /// axis stays as close to `up` as the basis allows. Degenerate input
    /// (zero forward, or forward colinear with up) falls back to the
    /// nearest well-defined rotation.
    pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
        let fw = forward.normalized();
        if fw.sqr_magnitude() < Self::EPSILON {
            return Self::IDENTITY;
        }

        let right = up.normalized().cross(fw);
        if right.sqr_magnitude() < Self::EPSILON {
            // no unique frame when forward and up are colinear
            return Self::from_to_rotation(Vec3::FORWARD, fw);
        }
        let right = right.normalized();
        let up = fw.cross(right);

        let mut m = Mat4::IDENTITY;
        m.set_column(0, right.extend(0.0));
        m.set_column(1, up.extend(0.0));
        m.set_column(2, fw.extend(0.0));

        m.rotation()
    }

    pub fn lerp(a: Quat, b: Quat, t: f32) -> Quat {
        Self::lerp_unclamped(a, b, t.clamp(0.0, 1.0))
    }

    /// Component-wise blend, renormalized. The antipodal midpoint blends to
    /// a zero quaternion, which normalizes to the identity.
    pub fn lerp_unclamped(a: Quat, b: Quat, t: f32) -> Quat {
        let s = 1.0 - t;
        Quat::new(
            s * a.x + t * b.x,
            s * a.y + t * b.y,
            s * a.z + t * b.z,
            s * a.w + t * b.w,
        )
        .normalized()
    }

    pub fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
        Self::slerp_unclamped(a, b, t.clamp(0.0, 1.0))
    }

    /// Spherical interpolation along the shortest path. Falls back to
    /// [`lerp_unclamped`](Self::lerp_unclamped) when the angle between the
    /// rotations is too small for the spherical weights.
    pub fn slerp_unclamped(a: Quat, b: Quat, t: f32) -> Quat {
        let na = a.normalized();
        let mut nb = b.normalized();

        let mut dot = Quat::dot(na, nb);
        if dot < 0.0 {
            // shortest interpolation path
            nb = Quat::new(-nb.x, -nb.y, -nb.z, -nb.w);
            dot = -dot;
        }

        let angle = dot.clamp(-1.0, 1.0).acos();
        let sin = angle.sin();

        if sin < Self::EPSILON {
            return Self::lerp_unclamped(a, b, t);
        }

        let wa = ((1.0 - t) * angle).sin() / sin;
        let wb = (t * angle).sin() / sin;

        Quat::new(
            na.x * wa + nb.x * wb,
            na.y * wa + nb.y * wb,
            na.z * wa + nb.z * wb,
            na.w * wa + nb.w * wb,
        )
    }

    /// Step from `from` towards `to` by at most `max_degrees`, never
    /// overshooting.
    pub fn rotate_towards(from: Quat, to: Quat, max_degrees: f32) -> Quat {
        let angle = Quat::angle(from, to);
        if angle == 0.0 {
            return to;
        }
        Self::slerp_unclamped(from, to, (max_degrees / angle).min(1.0))
    }

    /// This rotation embedded in a homogeneous 4x4 matrix.
    pub fn to_mat4(self) -> Mat4 {
        let x = self.x;
        let y = self.y;
        let z = self.z;
        let w = self.w;

        let xy = x * y;
        let xz = x * z;
        let xw = x * w;
        let yz = y * z;
        let yw = y * w;
        let zw = z * w;
        let x_squared = x * x;
        let y_squared = y * y;
        let z_squared = z * z;

        let mut m = Mat4::IDENTITY;
        m.e[0][0] = 1. - 2. * (y_squared + z_squared);
        m.e[1][0] = 2. * (xy - zw);
        m.e[2][0] = 2. * (xz + yw);

        m.e[0][1] = 2. * (xy + zw);
        m.e[1][1] = 1. - 2. * (x_squared + z_squared);
        m.e[2][1] = 2. * (yz - xw);

        m.e[0][2] = 2. * (xz - yw);
        m.e[1][2] = 2. * (yz + xw);
        m.e[2][2] = 1. - 2. * (x_squared + y_squared);

        m
    }
}

impl fmt::Display for Quat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Quat(x: {:.prec$}, y: {:.prec$}, z: {:.prec$}, w: {:.prec$})",
               self.x, self.y, self.z, self.w,
               prec = f.precision().unwrap_or(3))
    }
}

impl ops::Mul<Quat> for f32 {
    type Output = Quat;

    #[inline]
    fn mul(self, rhs: Quat) -> Quat {
        Quat {
            x: rhs.x * self,
            y: rhs.y * self,
            z: rhs.z * self,
            w: rhs.w * self,
        }
    }
}

/// Hamilton product: `q1 * q2` applies `q2` first, then `q1`.
impl ops::Mul<Quat> for Quat {
    type Output = Quat;

    #[inline]
    fn mul(self, rhs: Quat) -> Quat {
        let a = self.im();
        let b = rhs.im();

        let w = self.w * rhs.w - a.dot(b);
        let v = self.w * b + rhs.w * a + a.cross(b);
        Quat {
            x: v.x,
            y: v.y,
            z: v.z,
            w,
        }
    }
}

/// Rotates a vector without building the full matrix:
/// `v + 2w(u x v) + 2(u x (u x v))` for a unit quaternion with imaginary
/// part `u`.
impl ops::Mul<Vec3> for Quat {
    type Output = Vec3;

    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        let u = self.im();
        let uv = u.cross(rhs);
        let uuv = u.cross(uv);

        rhs + uv * (2.0 * self.re()) + uuv * 2.0
    }
}
