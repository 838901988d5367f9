use nalgebra::{Matrix4, Vector3};

/// 判定列范数偏离1时使用的容差。
pub const UNIT_TOLERANCE: f64 = 1e-6;
/// 判定非对角元素非零（存在剪切）时使用的容差。
pub const SHEAR_TOLERANCE: f64 = 1e-6;

/// 去除仿射矩阵中的缩放成分：把3x3块的每一列除以其欧氏范数，
/// 平移列原样保留，底行强制为[0,0,0,1]。
/// 若某列范数为零，结果含非有限值，由调用方保证矩阵非退化。
pub fn remove_scaling(affine: &Matrix4<f64>) -> Matrix4<f64> {
    let mut out = Matrix4::<f64>::identity();
    for c in 0..3 {
        let norm = affine.fixed_view::<3, 1>(0, c).norm();
        for r in 0..3 {
            out[(r, c)] = affine[(r, c)] / norm;
        }
    }
    for r in 0..3 {
        out[(r, 3)] = affine[(r, 3)];
    }
    out
}

/// 3x3块各列的欧氏范数。全为1表示不含缩放。
pub fn scaling_ratios(affine: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(
        affine.fixed_view::<3, 1>(0, 0).norm(),
        affine.fixed_view::<3, 1>(0, 1).norm(),
        affine.fixed_view::<3, 1>(0, 2).norm(),
    )
}

/// 仿射矩阵是否含缩放成分。
pub fn has_scaling(affine: &Matrix4<f64>) -> bool {
    let ratios = scaling_ratios(affine);
    (0..3).any(|i| (ratios[i] - 1.0).abs() > UNIT_TOLERANCE)
}

/// 仿射矩阵3x3块是否含非对角成分。
pub fn has_shearing(affine: &Matrix4<f64>) -> bool {
    for r in 0..3 {
        for c in 0..3 {
            if r != c && affine[(r, c)].abs() > SHEAR_TOLERANCE {
                return true;
            }
        }
    }
    false
}

/// 组合受试者空间到图谱空间的变换：`atlas * subject^-1`。
/// 受试者仿射不可逆时返回`None`。
pub fn compose(atlas: &Matrix4<f64>, subject: &Matrix4<f64>) -> Option<Matrix4<f64>> {
    subject.try_inverse().map(|inv| atlas * inv)
}
