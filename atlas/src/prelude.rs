pub use super::registration::{Ptransformation, RigidRegistrar, Srreg, TransformApplier};
pub use super::space::affine::{
    compose, has_scaling, has_shearing, remove_scaling, scaling_ratios,
};
pub use super::space::log::SubjectTimer;
pub use super::space::mesh::{AxisFlip, Mesh, PolyConnectivity};
pub use super::space::vtk::{read_polydata, write_polydata};
pub use super::space::volume::{affine_from_header, load_affine};
