use nalgebra::Matrix4;
use nifti::{NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

/// 从NIfTI文件头部读出体素到世界坐标的仿射矩阵。
pub fn load_affine<P: AsRef<Path>>(path: P) -> Matrix4<f64> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .unwrap_or_else(|e| panic!("failed to read NIfTI file `{}`: {e}", path.display()));
    affine_from_header(obj.header())
}

/// 按sform、qform、pixdim的优先级组装头部仿射。
pub fn affine_from_header(header: &NiftiHeader) -> Matrix4<f64> {
    if header.sform_code > 0 {
        let r0 = header.srow_x;
        let r1 = header.srow_y;
        let r2 = header.srow_z;
        Matrix4::new(
            r0[0] as f64, r0[1] as f64, r0[2] as f64, r0[3] as f64, //
            r1[0] as f64, r1[1] as f64, r1[2] as f64, r1[3] as f64, //
            r2[0] as f64, r2[1] as f64, r2[2] as f64, r2[3] as f64, //
            0.0, 0.0, 0.0, 1.0,
        )
    } else if header.qform_code > 0 {
        // 四元数表示，见NIfTI-1标准
        let b = header.quatern_b as f64;
        let c = header.quatern_c as f64;
        let d = header.quatern_d as f64;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] == 0.0 {
            1.0
        } else {
            header.pixdim[0] as f64
        };

        let dx = header.pixdim[1] as f64;
        let dy = header.pixdim[2] as f64;
        let dz = header.pixdim[3] as f64 * qfac;

        Matrix4::new(
            (a * a + b * b - c * c - d * d) * dx,
            (2.0 * b * c - 2.0 * a * d) * dy,
            (2.0 * b * d + 2.0 * a * c) * dz,
            header.quatern_x as f64,
            (2.0 * b * c + 2.0 * a * d) * dx,
            (a * a + c * c - b * b - d * d) * dy,
            (2.0 * c * d - 2.0 * a * b) * dz,
            header.quatern_y as f64,
            (2.0 * b * d - 2.0 * a * c) * dx,
            (2.0 * c * d + 2.0 * a * b) * dy,
            (a * a + d * d - c * c - b * b) * dz,
            header.quatern_z as f64,
            0.0,
            0.0,
            0.0,
            1.0,
        )
    } else {
        // 头部无坐标变换信息，退化为体素间距缩放
        Matrix4::new(
            header.pixdim[1] as f64, 0.0, 0.0, 0.0, //
            0.0, header.pixdim[2] as f64, 0.0, 0.0, //
            0.0, 0.0, header.pixdim[3] as f64, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }
}
