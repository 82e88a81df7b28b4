use core::ops;

use crate::vec::{Vec3, Vec4};
use crate::quat::Quat;

use bytemuck::{Pod, Zeroable};

/// Column-major 4x4 transform. `e[col][row]` holds the element at
/// `(row, col)`; the flat index `row + col * 4` matches the column order
/// of [`from_columns`](Self::from_columns).
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Mat4 {
    pub e: [[f32; 4]; 4],
}

impl Default for Mat4 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const ZERO: Mat4 = Mat4 { e: [[0.0; 4]; 4] };

    pub const IDENTITY: Mat4 = Mat4 {
        e: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    #[inline]
    pub fn from_columns(v: &[Vec4; 4]) -> Mat4 {
        let mut m = Mat4::ZERO;
        for i in 0..4 {
            m.e[i] = v[i].to_slice();
        }
        m
    }

    /// Column `index` as a vector. Panics when `index > 3`.
    #[inline]
    pub fn column(&self, index: usize) -> Vec4 {
        Vec4::from_slice(&self.e[index])
    }

    /// Row `index` as a vector. Panics when `index > 3`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        assert!(index < 4, "row index out of range: {index}");
        Vec4::new(self.e[0][index], self.e[1][index], self.e[2][index], self.e[3][index])
    }

    #[inline]
    pub fn set_column(&mut self, index: usize, column: Vec4) {
        self.e[index] = column.to_slice();
    }

    #[inline]
    pub fn set_row(&mut self, index: usize, row: Vec4) {
        assert!(index < 4, "row index out of range: {index}");
        self.e[0][index] = row.x;
        self.e[1][index] = row.y;
        self.e[2][index] = row.z;
        self.e[3][index] = row.w;
    }

    #[inline]
    pub fn transpose(&self) -> Mat4 {
        let mut m = Mat4::ZERO;
        for j in 0..4 {
            for i in 0..4 {
                m.e[j][i] = self.e[i][j];
            }
        }
        m
    }

    #[inline]
    pub fn to_columns(&self) -> [Vec4; 4] {
        unsafe {
            std::mem::transmute_copy::<Mat4, [Vec4; 4]>(self)
        }
    }

    #[inline]
    pub fn to_rows(&self) -> [Vec4; 4] {
        self.transpose().to_columns()
    }

    #[inline]
    pub fn from_translation(v: Vec3) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        m.e[3][0..3].copy_from_slice(&v.to_slice());
        m
    }

    #[inline]
    pub fn from_scale(v: Vec3) -> Mat4 {
        let s = v.to_slice();
        let mut m = Mat4::IDENTITY;
        for i in 0..3 {
            m.e[i][i] = s[i];
        }
        m
    }

    #[inline]
    pub fn from_rotation(q: Quat) -> Mat4 {
        q.to_mat4()
    }

    /// Scale, then rotate, then translate when applied to a point.
    #[inline]
    pub fn trs(pos: Vec3, rot: Quat, scale: Vec3) -> Mat4 {
        Self::from_translation(pos) * Self::from_rotation(rot) * Self::from_scale(scale)
    }

    #[inline]
    pub fn set_trs(&mut self, pos: Vec3, rot: Quat, scale: Vec3) {
        *self = Self::trs(pos, rot, scale);
    }

    /// Translation column.
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.e[3][0], self.e[3][1], self.e[3][2])
    }

    /// Rotation of the upper 3x3 block, assuming orthonormal (scale-free)
    /// columns. Callers holding a scaled matrix must divide the scale out
    /// first or accept a skewed result.
    pub fn rotation(&self) -> Quat {
        let m00 = self.e[0][0];
        let m01 = self.e[1][0];
        let m02 = self.e[2][0];
        let m10 = self.e[0][1];
        let m11 = self.e[1][1];
        let m12 = self.e[2][1];
        let m20 = self.e[0][2];
        let m21 = self.e[1][2];
        let m22 = self.e[2][2];

        let trace = m00 + m11 + m22;
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quat::new((m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s, 0.25 * s)
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Quat::new(0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s)
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Quat::new((m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s)
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Quat::new((m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s)
        }
    }

    /// Per-axis scale magnitudes of the 3x3 block. "Lossy" because skew and
    /// mirrored axes cannot be recovered, only the magnitude per axis.
    pub fn lossy_scale(&self) -> Vec3 {
        Vec3::new(
            self.column(0).truncate().magnitude(),
            self.column(1).truncate().magnitude(),
            self.column(2).truncate().magnitude(),
        )
    }

    /// Whether the matrix decomposes into translation, rotation and a
    /// non-degenerate, positively oriented scale.
    pub fn valid_trs(&self) -> bool {
        if self.e[0][3] != 0.0 || self.e[1][3] != 0.0 || self.e[2][3] != 0.0 || self.e[3][3] != 1.0 {
            return false;
        }
        let c0 = self.column(0).truncate();
        let c1 = self.column(1).truncate();
        let c2 = self.column(2).truncate();

        c0.sqr_magnitude() > f32::EPSILON
            && c1.sqr_magnitude() > f32::EPSILON
            && c2.sqr_magnitude() > f32::EPSILON
            && c0.dot(c1.cross(c2)) > f32::EPSILON
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Transforms a point, dividing through by the homogeneous coordinate
    /// when it is meaningful; a degenerate `w` skips the division.
    pub fn multiply_point(&self, p: Vec3) -> Vec3 {
        let v = *self * p.extend(1.0);
        if v.w.abs() > f32::EPSILON {
            Vec3::new(v.x / v.w, v.y / v.w, v.z / v.w)
        } else {
            v.truncate()
        }
    }

    /// Affine fast path: transforms a point assuming the matrix carries no
    /// projection, so `w` stays 1.
    #[inline]
    pub fn multiply_point3x4(&self, p: Vec3) -> Vec3 {
        (*self * p.extend(1.0)).truncate()
    }

    /// Transforms a direction: the 3x3 block only, translation ignored.
    #[inline]
    pub fn multiply_vector(&self, v: Vec3) -> Vec3 {
        (*self * v.extend(0.0)).truncate()
    }

    pub fn determinant(&self) -> f32 {
        let m00 = self.e[0][0];
        let m01 = self.e[1][0];
        let m02 = self.e[2][0];
        let m03 = self.e[3][0];
        let m10 = self.e[0][1];
        let m11 = self.e[1][1];
        let m12 = self.e[2][1];
        let m13 = self.e[3][1];
        let m20 = self.e[0][2];
        let m21 = self.e[1][2];
        let m22 = self.e[2][2];
        let m23 = self.e[3][2];
        let m30 = self.e[0][3];
        let m31 = self.e[1][3];
        let m32 = self.e[2][3];
        let m33 = self.e[3][3];

        let a2323 = m22 * m33 - m23 * m32;
        let a1323 = m21 * m33 - m23 * m31;
        let a1223 = m21 * m32 - m22 * m31;
        let a0323 = m20 * m33 - m23 * m30;
        let a0223 = m20 * m32 - m22 * m30;
        let a0123 = m20 * m31 - m21 * m30;

        m00 * (m11 * a2323 - m12 * a1323 + m13 * a1223)
            - m01 * (m10 * a2323 - m12 * a0323 + m13 * a0223)
            + m02 * (m10 * a1323 - m11 * a0323 + m13 * a0123)
            - m03 * (m10 * a1223 - m11 * a0223 + m12 * a0123)
    }

    /// Inverse of this matrix; a singular matrix inverts to
    /// [`ZERO`](Self::ZERO) rather than erroring. Affine matrices, the
    /// transform hierarchy's only case, take a 3x3 shortcut.
    pub fn inverse(&self) -> Mat4 {
        if self.e[0][3] == 0.0 && self.e[1][3] == 0.0 && self.e[2][3] == 0.0 && self.e[3][3] == 1.0
        {
            self.inverse_affine()
        } else {
            self.inverse_general()
        }
    }

    fn inverse_affine(&self) -> Mat4 {
        let c0 = self.column(0).truncate();
        let c1 = self.column(1).truncate();
        let c2 = self.column(2).truncate();
        let t = self.column(3).truncate();

        let det = c0.dot(c1.cross(c2));
        if det.abs() < f32::EPSILON {
            return Mat4::ZERO;
        }
        let inv_det = 1.0 / det;

        // rows of the inverted 3x3 block
        let r0 = c1.cross(c2) * inv_det;
        let r1 = c2.cross(c0) * inv_det;
        let r2 = c0.cross(c1) * inv_det;

        let mut m = Mat4::IDENTITY;
        m.set_column(0, Vec4::new(r0.x, r1.x, r2.x, 0.0));
        m.set_column(1, Vec4::new(r0.y, r1.y, r2.y, 0.0));
        m.set_column(2, Vec4::new(r0.z, r1.z, r2.z, 0.0));
        m.set_column(3, Vec4::new(-r0.dot(t), -r1.dot(t), -r2.dot(t), 1.0));
        m
    }

    fn inverse_general(&self) -> Mat4 {
        let m00 = self.e[0][0];
        let m01 = self.e[1][0];
        let m02 = self.e[2][0];
        let m03 = self.e[3][0];
        let m10 = self.e[0][1];
        let m11 = self.e[1][1];
        let m12 = self.e[2][1];
        let m13 = self.e[3][1];
        let m20 = self.e[0][2];
        let m21 = self.e[1][2];
        let m22 = self.e[2][2];
        let m23 = self.e[3][2];
        let m30 = self.e[0][3];
        let m31 = self.e[1][3];
        let m32 = self.e[2][3];
        let m33 = self.e[3][3];

        let a2323 = m22 * m33 - m23 * m32;
        let a1323 = m21 * m33 - m23 * m31;
        let a1223 = m21 * m32 - m22 * m31;
        let a0323 = m20 * m33 - m23 * m30;
        let a0223 = m20 * m32 - m22 * m30;
        let a0123 = m20 * m31 - m21 * m30;
        let a2313 = m12 * m33 - m13 * m32;
        let a1313 = m11 * m33 - m13 * m31;
        let a1213 = m11 * m32 - m12 * m31;
        let a2312 = m12 * m23 - m13 * m22;
        let a1312 = m11 * m23 - m13 * m21;
        let a1212 = m11 * m22 - m12 * m21;
        let a0313 = m10 * m33 - m13 * m30;
        let a0213 = m10 * m32 - m12 * m30;
        let a0312 = m10 * m23 - m13 * m20;
        let a0212 = m10 * m22 - m12 * m20;
        let a0113 = m10 * m31 - m11 * m30;
        let a0112 = m10 * m21 - m11 * m20;

        let det = m00 * (m11 * a2323 - m12 * a1323 + m13 * a1223)
            - m01 * (m10 * a2323 - m12 * a0323 + m13 * a0223)
            + m02 * (m10 * a1323 - m11 * a0323 + m13 * a0123)
            - m03 * (m10 * a1223 - m11 * a0223 + m12 * a0123);
        if det.abs() < f32::EPSILON {
            return Mat4::ZERO;
        }
        let inv_det = 1.0 / det;

        let mut m = Mat4::ZERO;
        m.e[0][0] = inv_det * (m11 * a2323 - m12 * a1323 + m13 * a1223);
        m.e[1][0] = -inv_det * (m01 * a2323 - m02 * a1323 + m03 * a1223);
        m.e[2][0] = inv_det * (m01 * a2313 - m02 * a1313 + m03 * a1213);
        m.e[3][0] = -inv_det * (m01 * a2312 - m02 * a1312 + m03 * a1212);
        m.e[0][1] = -inv_det * (m10 * a2323 - m12 * a0323 + m13 * a0223);
        m.e[1][1] = inv_det * (m00 * a2323 - m02 * a0323 + m03 * a0223);
        m.e[2][1] = -inv_det * (m00 * a2313 - m02 * a0313 + m03 * a0213);
        m.e[3][1] = inv_det * (m00 * a2312 - m02 * a0312 + m03 * a0212);
        m.e[0][2] = inv_det * (m10 * a1323 - m11 * a0323 + m13 * a0123);
        m.e[1][2] = -inv_det * (m00 * a1323 - m01 * a0323 + m03 * a0123);
        m.e[2][2] = inv_det * (m00 * a1313 - m01 * a0313 + m03 * a0113);
        m.e[3][2] = -inv_det * (m00 * a1312 - m01 * a0312 + m03 * a0112);
        m.e[0][3] = -inv_det * (m10 * a1223 - m11 * a0223 + m12 * a0123);
        m.e[1][3] = inv_det * (m00 * a1223 - m01 * a0223 + m02 * a0123);
        m.e[2][3] = -inv_det * (m00 * a1213 - m01 * a0213 + m02 * a0113);
        m.e[3][3] = inv_det * (m00 * a1212 - m01 * a0212 + m02 * a0112);
        m
    }
}

/// Flat element access, `index = row + col * 4`. Panics out of 0..16.
impl ops::Index<usize> for Mat4 {
    type Output = f32;

    #[inline]
    fn index(&self, index: usize) -> &f32 {
        &self.e[index / 4][index % 4]
    }
}

impl ops::IndexMut<usize> for Mat4 {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.e[index / 4][index % 4]
    }
}

/// `(row, col)` element access. Panics when either index exceeds 3.
impl ops::Index<(usize, usize)> for Mat4 {
    type Output = f32;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        assert!(row < 4, "row index out of range: {row}");
        &self.e[col][row]
    }
}

impl ops::IndexMut<(usize, usize)> for Mat4 {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f32 {
        assert!(row < 4, "row index out of range: {row}");
        &mut self.e[col][row]
    }
}

impl ops::Mul<Mat4> for Mat4 {
    type Output = Mat4;

    #[inline]
    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut m = Mat4::ZERO;

        let a = self.to_rows();
        let b = rhs.to_columns();

        for j in 0..4 {
            for i in 0..4 {
                m.e[j][i] = Vec4::dot(a[i], b[j]);
            }
        }
        m
    }
}

impl ops::Mul<Vec4> for Mat4 {
    type Output = Vec4;

    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        let mut v = [0.0; 4];

        let a = self.to_rows();

        for i in 0..4 {
            v[i] = a[i].dot(rhs);
        }
        Vec4::from_slice(&v)
    }
}
