use super::mesh::{Mesh, PolyConnectivity};
use nalgebra::Point3;
use std::path::Path;
use vtkio::model::{
    Attributes, ByteOrder, DataSet, IOBuffer, Piece, PolyDataPiece, Version, VertexNumbers, Vtk,
};

/// 读取legacy VTK多边形网格文件。
pub fn read_polydata<P: AsRef<Path>>(path: P) -> Mesh {
    let path = path.as_ref();
    let vtk = Vtk::import(path)
        .unwrap_or_else(|e| panic!("failed to read VTK file `{}`: {e}", path.display()));

    let pieces = match vtk.data {
        DataSet::PolyData { pieces, .. } => pieces,
        _ => panic!("`{}` is not a polydata VTK file", path.display()),
    };
    let piece = pieces
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("`{}` contains no polydata piece", path.display()))
        .load_piece_data(None)
        .unwrap_or_else(|e| panic!("failed to load polydata from `{}`: {e}", path.display()));

    let coords: Vec<f64> = piece
        .points
        .cast_into()
        .unwrap_or_else(|| panic!("`{}` has non-numeric point coordinates", path.display()));
    let points = coords
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect();

    let polys = match piece.polys {
        Some(vn) => {
            let (num_cells, vertices) = vn.into_legacy();
            PolyConnectivity {
                num_cells,
                vertices,
            }
        }
        None => PolyConnectivity::default(),
    };

    Mesh::new(points, polys)
}

/// 把网格写成legacy VTK ASCII多边形文件。
pub fn write_polydata<P: AsRef<Path>>(path: P, mesh: &Mesh) {
    let path = path.as_ref();
    let mut coords = Vec::with_capacity(mesh.points.len() * 3);
    for p in &mesh.points {
        coords.extend_from_slice(&[p.x, p.y, p.z]);
    }

    let polys = if mesh.polys.num_cells == 0 {
        None
    } else {
        Some(VertexNumbers::Legacy {
            num_cells: mesh.polys.num_cells,
            vertices: mesh.polys.vertices.clone(),
        })
    };

    let vtk = Vtk {
        version: Version { major: 4, minor: 2 },
        title: String::from("mesh"),
        byte_order: ByteOrder::BigEndian,
        data: DataSet::PolyData {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(PolyDataPiece {
                points: IOBuffer::F64(coords),
                verts: None,
                lines: None,
                polys,
                strips: None,
                data: Attributes::new(),
            }))],
        },
        file_path: None,
    };
    vtk.export_ascii(path)
        .unwrap_or_else(|e| panic!("failed to write VTK file `{}`: {e}", path.display()));
}
