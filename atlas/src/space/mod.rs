pub mod affine;
pub mod log;
pub mod mesh;
pub mod vtk;
pub mod volume;

pub use log::SubjectTimer;
pub use mesh::{AxisFlip, Mesh, PolyConnectivity};
