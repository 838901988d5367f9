use std::path::Path;
use std::process::Command;

/// 刚性配准工具的能力接口。实现者以`fixed`为参考对`moving`做
/// 刚性配准，把变换结果写入`dofout`文件。
pub trait RigidRegistrar {
    fn compute_dof(&self, moving: &Path, fixed: &Path, dofout: &Path) -> Result<(), String>;
}

/// 变换应用工具的能力接口。实现者把`dofin`中的变换施加到
/// `input`网格，结果写入`output`。
pub trait TransformApplier {
    fn apply(&self, input: &Path, output: &Path, dofin: &Path) -> Result<(), String>;
}

/// 调用外部`srreg`命令行的实现。
pub struct Srreg;

impl RigidRegistrar for Srreg {
    fn compute_dof(&self, moving: &Path, fixed: &Path, dofout: &Path) -> Result<(), String> {
        run_tool(
            Command::new("srreg")
                .arg(moving)
                .arg(fixed)
                .arg("-dofout")
                .arg(dofout)
                .arg("-symmetric"),
        )
    }
}

/// 调用外部`ptransformation`命令行的实现。
pub struct Ptransformation;

impl TransformApplier for Ptransformation {
    fn apply(&self, input: &Path, output: &Path, dofin: &Path) -> Result<(), String> {
        run_tool(
            Command::new("ptransformation")
                .arg(input)
                .arg(output)
                .arg("-dofin")
                .arg(dofin),
        )
    }
}

// 同步等待子进程退出，不设超时
fn run_tool(cmd: &mut Command) -> Result<(), String> {
    let status = cmd
        .status()
        .map_err(|e| format!("failed to spawn `{cmd:?}`: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("`{cmd:?}` exited with {status}"))
    }
}
