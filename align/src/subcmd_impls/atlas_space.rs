use atlas::prelude::{
    compose, load_affine, read_polydata, remove_scaling, write_polydata, AxisFlip,
    PolyConnectivity, Ptransformation, RigidRegistrar, Srreg, SubjectTimer, TransformApplier,
};
use clap::Args;
use nalgebra::Matrix4;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 受试者全部帧处理成功后写入输出目录的标记文件名。
const COMPLETE_MARKER: &str = ".complete";

#[derive(Args, Debug)]
pub struct AtlasSpace {
    /// UKBB图像数据根目录。
    #[arg(long = "ukbb-dir", short = 'U')]
    ukbb_dir: PathBuf,
    /// 受试者网格根目录。
    #[arg(long = "mesh-dir", short = 'M')]
    mesh_dir: PathBuf,
    /// 图谱数据目录。
    #[arg(long = "atlas-dir", short = 'A')]
    atlas_dir: PathBuf,
    /// 输出根目录。
    #[arg(long = "output-dir", short = 'O')]
    output_dir: PathBuf,
    /// 处理的部位名。
    #[arg(long, default_value = "LVmyo")]
    section: String,
    /// 每个受试者的帧数。
    #[arg(long, default_value_t = 50, value_parser = frames_legal_range)]
    frames: usize,
    /// 变换后点坐标的取反轴（"xyz"的子集或"none"）。
    #[arg(long, default_value = "yz", value_parser = flip_valid_axes)]
    flip: AxisFlip,
}

fn frames_legal_range(s: &str) -> Result<usize, String> {
    let frames: usize = s
        .parse()
        .map_err(|_| format!("`{s}` is not a legal frame count"))?;
    if frames == 0 {
        return Err(String::from("frame count must be positive"));
    }
    Ok(frames)
}

fn flip_valid_axes(s: &str) -> Result<AxisFlip, String> {
    if s == "none" {
        return Ok(AxisFlip::NONE);
    }
    let mut flip = AxisFlip::NONE;
    for ch in s.chars() {
        match ch {
            'x' => flip.x = true,
            'y' => flip.y = true,
            'z' => flip.z = true,
            _ => {
                return Err(format!(
                    "`{s}` is not a legal flip spec (expected a subset of \"xyz\", or \"none\")"
                ))
            }
        }
    }
    Ok(flip)
}

impl AtlasSpace {
    pub fn run(&mut self) {
        // [MESH_DIR/<subject>/vtkfile] -> [OUTPUT_DIR/<subject>/<SECTION>_template_space]
        assert!(self.mesh_dir.is_dir());
        fs::create_dir_all(self.output_dir.as_path()).unwrap();

        let mut atlas_img = self.atlas_dir.clone();
        atlas_img.push("template.nii.gz");
        let mut atlas_mesh = self.atlas_dir.clone();
        atlas_mesh.push("myo_ED.vtk");

        let atlas = AtlasContext::load(atlas_img.as_path(), atlas_mesh);
        Program::new(
            self.ukbb_dir.clone(),
            self.mesh_dir.clone(),
            self.output_dir.clone(),
            self.section.clone(),
            self.frames,
            self.flip,
            atlas,
            &Srreg,
            &Ptransformation,
        )
        .run();
    }
}

/// 一次加载、全程只读的图谱数据。
struct AtlasContext {
    /// 去除缩放后的图谱仿射。
    affine: Matrix4<f64>,
    /// 图谱网格文件路径，刚性配准的fixed端。
    mesh_path: PathBuf,
    /// 图谱网格点数。
    point_count: usize,
    /// 图谱网格面连接，所有输出网格继承它。
    polys: PolyConnectivity,
}

impl AtlasContext {
    fn load(image_path: &Path, mesh_path: PathBuf) -> Self {
        let affine = remove_scaling(&load_affine(image_path));
        let mesh = read_polydata(mesh_path.as_path());
        Self {
            affine,
            mesh_path,
            point_count: mesh.num_points(),
            polys: mesh.polys,
        }
    }
}

struct Program<'a> {
    ukbb_dir: PathBuf,
    mesh_dir: PathBuf,
    output_dir: PathBuf,
    section: String,
    frames: usize,
    flip: AxisFlip,
    atlas: AtlasContext,
    registrar: &'a dyn RigidRegistrar,
    applier: &'a dyn TransformApplier,
}

impl<'a> Program<'a> {
    #[inline]
    pub fn new(
        ukbb_dir: PathBuf,
        mesh_dir: PathBuf,
        output_dir: PathBuf,
        section: String,
        frames: usize,
        flip: AxisFlip,
        atlas: AtlasContext,
        registrar: &'a dyn RigidRegistrar,
        applier: &'a dyn TransformApplier,
    ) -> Self {
        Self {
            ukbb_dir,
            mesh_dir,
            output_dir,
            section,
            frames,
            flip,
            atlas,
            registrar,
            applier,
        }
    }

    pub fn run(&mut self) {
        let mut subjects = Vec::new();
        for entry in WalkDir::new(self.mesh_dir.as_path()).min_depth(1).max_depth(1) {
            let entry = entry.unwrap();
            if entry.path().is_dir() {
                subjects.push(entry.file_name().to_str().unwrap().to_string());
            }
        }
        println!("受试者总数: {}", subjects.len());

        for subject in subjects {
            self.run_subject(subject.as_str());
        }
        println!("全部处理完成.");
    }

    fn run_subject(&mut self, subject: &str) {
        println!("处理受试者`{subject}`...");
        let timer = SubjectTimer::start();

        let folder_align = self.template_space_dir(subject);
        if folder_align.join(COMPLETE_MARKER).is_file() {
            println!("\t输出目录已有完成标记, 跳过.");
            return;
        }
        if folder_align.is_dir() {
            println!("\t输出目录存在但无完成标记, 重新处理.");
        }
        fs::create_dir_all(folder_align.as_path()).unwrap();

        let mut sub_img = self.ukbb_dir.clone();
        sub_img.extend([subject, "4D_rview", "4Dimg.nii.gz"]);
        let affine_subject = remove_scaling(&load_affine(sub_img.as_path()));

        let transform = compose(&self.atlas.affine, &affine_subject)
            .unwrap_or_else(|| panic!("subject {subject} has a singular affine matrix"));

        let dof_dir = self.dof_dir(subject);
        fs::create_dir_all(dof_dir.as_path()).unwrap();
        let dof_file = dof_dir.join("dof_rreg.dof.gz");

        for frame in 0..self.frames {
            self.run_frame(
                subject,
                frame,
                &transform,
                folder_align.as_path(),
                dof_file.as_path(),
            );
        }

        // dof文件只在受试者内部有效
        if dof_dir.is_dir() {
            fs::remove_dir_all(dof_dir.as_path()).unwrap();
        }
        fs::write(folder_align.join(COMPLETE_MARKER), "").unwrap();

        println!(
            "\t受试者`{subject}`共{}帧处理完毕, 耗时{:.2}秒.",
            self.frames,
            timer.elapsed_secs()
        );
    }

    fn run_frame(
        &self,
        subject: &str,
        frame: usize,
        transform: &Matrix4<f64>,
        folder_align: &Path,
        dof_file: &Path,
    ) {
        let mut moving_path = self.mesh_dir.clone();
        moving_path.extend([subject, "vtkfile"]);
        moving_path.push(format!("mesh_{frame:02}.vtk"));

        let moving = read_polydata(moving_path.as_path());
        let transformed = moving.into_atlas_space(
            transform,
            self.flip,
            self.atlas.point_count,
            &self.atlas.polys,
        );

        let temp_mesh = tempfile::Builder::new()
            .suffix(".vtk")
            .tempfile()
            .unwrap();
        write_polydata(temp_mesh.path(), &transformed);

        // 第0帧算出的刚性变换对该受试者的所有帧复用
        if frame == 0 {
            self.registrar
                .compute_dof(temp_mesh.path(), self.atlas.mesh_path.as_path(), dof_file)
                .unwrap_or_else(|e| panic!("rigid registration failed for subject {subject}: {e}"));
        }

        let aligned_path = folder_align.join(format!("{}_fr{frame:02}.vtk", self.section));
        self.applier
            .apply(temp_mesh.path(), aligned_path.as_path(), dof_file)
            .unwrap_or_else(|e| {
                panic!("transform application failed for subject {subject} frame {frame}: {e}")
            });
    }

    fn template_space_dir(&self, subject: &str) -> PathBuf {
        let mut dir = self.output_dir.clone();
        dir.push(subject);
        dir.push(format!("{}_template_space", self.section));
        dir
    }

    fn dof_dir(&self, subject: &str) -> PathBuf {
        let mut dir = self.output_dir.clone();
        dir.push(subject);
        dir.push(format!("{}_dofs", self.section));
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use atlas::prelude::Mesh;
    use nalgebra::Point3;
    use ndarray::Array3;
    use nifti::writer::WriterOptions;
    use nifti::NiftiHeader;
    use std::cell::RefCell;
    use std::path::Path;

    struct MockRegistrar {
        calls: RefCell<Vec<(PathBuf, PathBuf, PathBuf)>>,
    }

    impl MockRegistrar {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl RigidRegistrar for MockRegistrar {
        fn compute_dof(&self, moving: &Path, fixed: &Path, dofout: &Path) -> Result<(), String> {
            self.calls
                .borrow_mut()
                .push((moving.into(), fixed.into(), dofout.into()));
            fs::write(dofout, b"dof").unwrap();
            Ok(())
        }
    }

    struct MockApplier {
        calls: RefCell<Vec<(PathBuf, PathBuf, PathBuf)>>,
    }

    impl MockApplier {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl TransformApplier for MockApplier {
        fn apply(&self, input: &Path, output: &Path, dofin: &Path) -> Result<(), String> {
            // 模拟外部工具: 原样拷贝输入网格
            fs::copy(input, output).unwrap();
            self.calls
                .borrow_mut()
                .push((input.into(), output.into(), dofin.into()));
            Ok(())
        }
    }

    fn write_identity_nifti(path: &Path) {
        let header = NiftiHeader {
            sform_code: 1,
            srow_x: [1.0, 0.0, 0.0, 0.0],
            srow_y: [0.0, 1.0, 0.0, 0.0],
            srow_z: [0.0, 0.0, 1.0, 0.0],
            ..Default::default()
        };
        let volume = Array3::<f32>::zeros((2, 2, 2));
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&volume)
            .unwrap();
    }

    struct Fixture {
        _root: tempfile::TempDir,
        ukbb_dir: PathBuf,
        mesh_dir: PathBuf,
        output_dir: PathBuf,
        atlas_mesh: PathBuf,
    }

    impl Fixture {
        fn new(subject: &str) -> Self {
            let root = tempfile::tempdir().unwrap();
            let ukbb_dir = root.path().join("ukbb");
            let mesh_dir = root.path().join("meshes");
            let output_dir = root.path().join("output");
            let atlas_mesh = root.path().join("myo_ED.vtk");

            let img_dir = ukbb_dir.join(subject).join("4D_rview");
            fs::create_dir_all(img_dir.as_path()).unwrap();
            write_identity_nifti(img_dir.join("4Dimg.nii.gz").as_path());

            let vtk_dir = mesh_dir.join(subject).join("vtkfile");
            fs::create_dir_all(vtk_dir.as_path()).unwrap();
            let mesh = Mesh::new(
                vec![Point3::new(1.0, 2.0, 3.0)],
                PolyConnectivity::default(),
            );
            write_polydata(vtk_dir.join("mesh_00.vtk").as_path(), &mesh);

            Self {
                _root: root,
                ukbb_dir,
                mesh_dir,
                output_dir,
                atlas_mesh,
            }
        }

        fn atlas(&self) -> AtlasContext {
            AtlasContext {
                affine: Matrix4::identity(),
                mesh_path: self.atlas_mesh.clone(),
                point_count: 1,
                polys: PolyConnectivity::default(),
            }
        }

        fn program<'a>(
            &self,
            registrar: &'a dyn RigidRegistrar,
            applier: &'a dyn TransformApplier,
        ) -> Program<'a> {
            Program::new(
                self.ukbb_dir.clone(),
                self.mesh_dir.clone(),
                self.output_dir.clone(),
                String::from("LVmyo"),
                1,
                AxisFlip::default(),
                self.atlas(),
                registrar,
                applier,
            )
        }
    }

    #[test]
    fn test_single_subject_single_frame() {
        let fixture = Fixture::new("100001");
        let registrar = MockRegistrar::new();
        let applier = MockApplier::new();
        fixture.program(&registrar, &applier).run();

        let reg_calls = registrar.calls.borrow();
        assert_eq!(reg_calls.len(), 1);
        assert_eq!(reg_calls[0].1, fixture.atlas_mesh);
        let dof_file = fixture
            .output_dir
            .join("100001")
            .join("LVmyo_dofs")
            .join("dof_rreg.dof.gz");
        assert_eq!(reg_calls[0].2, dof_file);

        let apply_calls = applier.calls.borrow();
        assert_eq!(apply_calls.len(), 1);
        let aligned = fixture
            .output_dir
            .join("100001")
            .join("LVmyo_template_space")
            .join("LVmyo_fr00.vtk");
        assert_eq!(apply_calls[0].1, aligned);
        assert_eq!(apply_calls[0].2, dof_file);

        // 恒等变换加默认取反: (1,2,3) -> (1,-2,-3)
        let out_mesh = read_polydata(aligned.as_path());
        assert_eq!(out_mesh.num_points(), 1);
        assert_relative_eq!(out_mesh.points[0].x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(out_mesh.points[0].y, -2.0, epsilon = 1e-9);
        assert_relative_eq!(out_mesh.points[0].z, -3.0, epsilon = 1e-9);

        assert!(aligned.parent().unwrap().join(COMPLETE_MARKER).is_file());
        assert!(!dof_file.parent().unwrap().exists());
    }

    struct FailingRegistrar;

    impl RigidRegistrar for FailingRegistrar {
        fn compute_dof(&self, _moving: &Path, _fixed: &Path, _dofout: &Path) -> Result<(), String> {
            Err(String::from("`srreg` exited with exit status: 1"))
        }
    }

    #[test]
    #[should_panic(expected = "rigid registration failed")]
    fn test_registrar_failure_aborts() {
        let fixture = Fixture::new("100004");
        let applier = MockApplier::new();
        fixture.program(&FailingRegistrar, &applier).run();
    }

    #[test]
    fn test_completed_subject_is_skipped() {
        let fixture = Fixture::new("100002");
        let registrar = MockRegistrar::new();
        let applier = MockApplier::new();
        fixture.program(&registrar, &applier).run();
        assert_eq!(registrar.calls.borrow().len(), 1);

        let registrar2 = MockRegistrar::new();
        let applier2 = MockApplier::new();
        fixture.program(&registrar2, &applier2).run();
        assert!(registrar2.calls.borrow().is_empty());
        assert!(applier2.calls.borrow().is_empty());
    }

    #[test]
    fn test_partial_output_is_reprocessed() {
        let fixture = Fixture::new("100003");
        let partial = fixture
            .output_dir
            .join("100003")
            .join("LVmyo_template_space");
        fs::create_dir_all(partial.as_path()).unwrap();
        fs::write(partial.join("LVmyo_fr00.vtk"), b"stale").unwrap();

        let registrar = MockRegistrar::new();
        let applier = MockApplier::new();
        fixture.program(&registrar, &applier).run();

        assert_eq!(registrar.calls.borrow().len(), 1);
        assert_eq!(applier.calls.borrow().len(), 1);
        assert!(partial.join(COMPLETE_MARKER).is_file());
    }
}
