use atlas::prelude::{has_scaling, has_shearing, load_affine, scaling_ratios};
use clap::Args;
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct AffineCheck {
    /// UKBB图像数据根目录。
    #[arg(long = "ukbb-dir", short = 'U')]
    ukbb_dir: PathBuf,
}

impl AffineCheck {
    pub fn run(&mut self) {
        assert!(self.ukbb_dir.is_dir());
        Program::new(self.ukbb_dir.clone()).run();
    }
}

struct Program {
    ukbb_dir: PathBuf,
    scaled: usize,
    sheared: usize,
    total: usize,
}

impl Program {
    #[inline]
    pub fn new(ukbb_dir: PathBuf) -> Self {
        Self {
            ukbb_dir,
            scaled: 0,
            sheared: 0,
            total: 0,
        }
    }

    pub fn run(&mut self) {
        let mut subjects = Vec::new();
        for entry in WalkDir::new(self.ukbb_dir.as_path()).min_depth(1).max_depth(1) {
            let entry = entry.unwrap();
            if entry.path().is_dir() {
                subjects.push(entry.file_name().to_str().unwrap().to_string());
            }
        }
        println!("受试者总数: {}", subjects.len());

        for subject in subjects {
            self.run_subject(subject.as_str());
        }
        println!(
            "检验完毕: 含缩放 {}/{}, 含剪切 {}/{}.",
            self.scaled, self.total, self.sheared, self.total
        );
    }

    fn run_subject(&mut self, subject: &str) {
        println!("检验受试者`{subject}`的仿射矩阵...");
        let mut img = self.ukbb_dir.clone();
        img.extend([subject, "4D_rview", "4Dimg.nii.gz"]);
        let affine = load_affine(img.as_path());
        self.total += 1;

        if has_scaling(&affine) {
            let ratios = scaling_ratios(&affine);
            eprintln!(
                "`check_scaling`: subject {subject}, column norms ({:.6}, {:.6}, {:.6}).",
                ratios.x, ratios.y, ratios.z
            );
            self.scaled += 1;
        }
        if has_shearing(&affine) {
            eprintln!("`check_shearing`: subject {subject} has off-diagonal terms.");
            self.sheared += 1;
        }
    }
}
