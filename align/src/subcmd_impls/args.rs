use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "align")]
#[command(about = "将受试者四维心脏网格序列对齐到图谱空间的工具集.")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 子命令。
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run_program(&mut self) {
        match self.command {
            Commands::AtlasSpace(ref mut v) => v.run(),
            Commands::AffineCheck(ref mut v) => v.run(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 把每个受试者的各帧网格变换并刚性配准到图谱空间。
    AtlasSpace(crate::subcmd_impls::atlas_space::AtlasSpace),
    /// 检查受试者仿射矩阵中是否存在缩放或剪切成分。
    AffineCheck(crate::subcmd_impls::affine_check::AffineCheck),
}
