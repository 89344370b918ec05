/// A 4x4 matrix stored in row-major order, applied to column vectors (`M * p`).
///
/// Used both for the local 2D transforms of widgets (translate, rotate, scale)
/// and for the view and projection matrices that carry a widget quad into clip space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Matrix data in row-major order: [row0, row1, row2, row3]
    pub data: [f32; 16],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        data: [
            1.0, 0.0, 0.0, 0.0, // row 0
            0.0, 1.0, 0.0, 0.0, // row 1
            0.0, 0.0, 1.0, 0.0, // row 2
            0.0, 0.0, 0.0, 1.0, // row 3
        ],
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        let [r0, r1, r2, r3] = rows;
        Self {
            data: [
                r0[0], r0[1], r0[2], r0[3], //
                r1[0], r1[1], r1[2], r1[3], //
                r2[0], r2[1], r2[2], r2[3], //
                r3[0], r3[1], r3[2], r3[3],
            ],
        }
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self::translate3d(x, y, 0.0)
    }

    pub fn translate3d(x: f32, y: f32, z: f32) -> Self {
        Self::from_rows([
            [1.0, 0.0, 0.0, x],
            [0.0, 1.0, 0.0, y],
            [0.0, 0.0, 1.0, z],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Rotation around the Z axis. With y pointing down this turns clockwise on screen.
    pub fn rotate(angle_radians: f32) -> Self {
        let (sin, cos) = angle_radians.sin_cos();
        Self::from_rows([
            [cos, -sin, 0.0, 0.0],
            [sin, cos, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotate_degrees(angle_degrees: f32) -> Self {
        Self::rotate(angle_degrees.to_radians())
    }

    pub fn rotate_x(angle_radians: f32) -> Self {
        let (sin, cos) = angle_radians.sin_cos();
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, cos, -sin, 0.0],
            [0.0, sin, cos, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotate_y(angle_radians: f32) -> Self {
        let (sin, cos) = angle_radians.sin_cos();
        Self::from_rows([
            [cos, 0.0, sin, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-sin, 0.0, cos, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn scale(s: f32) -> Self {
        Self::scale_xy(s, s)
    }

    pub fn scale_xy(sx: f32, sy: f32) -> Self {
        Self::scale3d(sx, sy, 1.0)
    }

    pub fn scale3d(sx: f32, sy: f32, sz: f32) -> Self {
        Self::from_rows([
            [sx, 0.0, 0.0, 0.0],
            [0.0, sy, 0.0, 0.0],
            [0.0, 0.0, sz, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Right-handed view matrix looking from `eye` towards `target`.
    pub fn look_at(eye: [f32; 3], target: [f32; 3], up: [f32; 3]) -> Self {
        let f = normalize(sub(target, eye));
        let s = normalize(cross(f, up));
        let u = cross(s, f);
        Self::from_rows([
            [s[0], s[1], s[2], -dot(s, eye)],
            [u[0], u[1], u[2], -dot(u, eye)],
            [-f[0], -f[1], -f[2], dot(f, eye)],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Orthographic projection of the box `[left, right] x [bottom, top] x [-near, -far]`
    /// onto clip space with depth in `0..1`.
    ///
    /// Passing `top < bottom` flips the vertical axis, which is how y-down layout
    /// coordinates are mapped.
    pub fn orthographic_off_center(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let rl = right - left;
        let tb = top - bottom;
        let nf = near - far;
        Self::from_rows([
            [2.0 / rl, 0.0, 0.0, -(right + left) / rl],
            [0.0, 2.0 / tb, 0.0, -(top + bottom) / tb],
            [0.0, 0.0, 1.0 / nf, near / nf],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Off-center perspective frustum. `left..top` describe the window on the near plane.
    pub fn perspective_off_center(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let rl = right - left;
        let tb = top - bottom;
        let nf = near - far;
        Self::from_rows([
            [2.0 * near / rl, 0.0, (right + left) / rl, 0.0],
            [0.0, 2.0 * near / tb, (top + bottom) / tb, 0.0],
            [0.0, 0.0, far / nf, near * far / nf],
            [0.0, 0.0, -1.0, 0.0],
        ])
    }

    /// Compose this transform with another: self * other
    /// Applies `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Transform {
        let a = &self.data;
        let b = &other.data;
        let mut result = [0.0f32; 16];

        for i in 0..4 {
            for j in 0..4 {
                result[i * 4 + j] = (0..4).map(|k| a[i * 4 + k] * b[k * 4 + j]).sum();
            }
        }

        Transform { data: result }
    }

    /// Multiply a homogeneous point.
    pub fn transform_vec4(&self, v: [f32; 4]) -> [f32; 4] {
        let m = &self.data;
        let mut out = [0.0f32; 4];
        for (i, o) in out.iter_mut().enumerate() {
            *o = m[i * 4] * v[0] + m[i * 4 + 1] * v[1] + m[i * 4 + 2] * v[2] + m[i * 4 + 3] * v[3];
        }
        out
    }

    /// Transform a 2D point lying on the z=0 plane, ignoring any projective part.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let [px, py, _, _] = self.transform_vec4([x, y, 0.0, 1.0]);
        (px, py)
    }

    /// Transform a 2D point and apply the perspective divide.
    /// Returns `None` when the point lands on or behind the eye plane.
    pub fn project_point(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let [px, py, _, w] = self.transform_vec4([x, y, 0.0, 1.0]);
        if w <= f32::EPSILON {
            return None;
        }
        Some((px / w, py / w))
    }

    pub fn rows(&self) -> [[f32; 4]; 4] {
        [
            [self.data[0], self.data[1], self.data[2], self.data[3]],
            [self.data[4], self.data[5], self.data[6], self.data[7]],
            [self.data[8], self.data[9], self.data[10], self.data[11]],
            [self.data[12], self.data[13], self.data[14], self.data[15]],
        ]
    }

    /// Column-major layout, as WGSL `mat4x4<f32>` expects.
    pub fn to_cols_array(&self) -> [[f32; 4]; 4] {
        let d = &self.data;
        [
            [d[0], d[4], d[8], d[12]],
            [d[1], d[5], d[9], d[13]],
            [d[2], d[6], d[10], d[14]],
            [d[3], d[7], d[11], d[15]],
        ]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn approx_eq(&self, other: &Transform, epsilon: f32) -> bool {
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = dot(v, v).sqrt();
    if len <= f32::EPSILON {
        return v;
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_translate() {
        let t = Transform::translate(10.0, 20.0);
        let (x, y) = t.transform_point(5.0, 5.0);
        assert!(approx_eq(x, 15.0));
        assert!(approx_eq(y, 25.0));
    }

    #[test]
    fn test_rotate() {
        let t = Transform::rotate_degrees(90.0);
        let (x, y) = t.transform_point(1.0, 0.0);
        assert!(approx_eq(x, 0.0));
        assert!(approx_eq(y, 1.0));
    }

    #[test]
    fn test_compose_order() {
        // Point (0,0) -> translate -> (10,0) -> scale -> (20,0)
        let composed = Transform::scale(2.0).then(&Transform::translate(10.0, 0.0));
        let (x, y) = composed.transform_point(0.0, 0.0);
        assert!(approx_eq(x, 20.0));
        assert!(approx_eq(y, 0.0));
    }

    #[test]
    fn test_cols_array_is_transpose() {
        let t = Transform::translate(1.0, 2.0);
        let cols = t.to_cols_array();
        assert_eq!(cols[3], [1.0, 2.0, 0.0, 1.0]);
        assert_eq!(t.rows()[0], [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let view = Transform::look_at([0.0, 0.0, 500.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let [x, y, z, w] = view.transform_vec4([3.0, 4.0, 0.0, 1.0]);
        assert!(approx_eq(x, 3.0));
        assert!(approx_eq(y, 4.0));
        assert!(approx_eq(z, -500.0));
        assert!(approx_eq(w, 1.0));
    }

    #[test]
    fn test_orthographic_flipped_y() {
        let p = Transform::orthographic_off_center(-50.0, 50.0, 25.0, -25.0, 1.0, 100.0);
        let (x, y) = p.transform_point(-50.0, -25.0);
        assert!(approx_eq(x, -1.0));
        assert!(approx_eq(y, 1.0));
    }

    #[test]
    fn test_perspective_matches_window_at_distance() {
        let d = 200.0;
        let near = d / 10.0;
        let k = near / d;
        let view = Transform::look_at([0.0, 0.0, d], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let proj = Transform::perspective_off_center(
            -100.0 * k,
            100.0 * k,
            50.0 * k,
            -50.0 * k,
            near,
            d * 10.0,
        );
        let (x, y) = proj.then(&view).project_point(100.0, -50.0).unwrap();
        assert!(approx_eq(x, 1.0));
        assert!(approx_eq(y, 1.0));
    }

    #[test]
    fn test_full_turn_returns_to_start() {
        let mut t = Transform::IDENTITY;
        for _ in 0..360 {
            t = t.then(&Transform::rotate_degrees(1.0));
        }
        assert!(t.approx_eq(&Transform::IDENTITY, 1e-4));
    }
}
