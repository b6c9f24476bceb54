//! Terrain mesh generation.
//!
//! Builds a square patch of the procedural terrain as a Bevy mesh. Vertices
//! are relative to the patch centre so the patch can be placed with a
//! [`WorldPosition`](crate::floating_origin::WorldPosition).

use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use geodrive::geo::{self, EnuFrame};
use glam::DVec3;

use crate::terrain::RollingHills;

/// Grass colour at the lowest point of the patch.
const LOW_COLOR: [f32; 4] = [0.18, 0.32, 0.12, 1.0];
/// Rock colour at the highest point of the patch.
const HIGH_COLOR: [f32; 4] = [0.45, 0.40, 0.33, 1.0];

/// Build a `resolution` x `resolution` vertex patch of `terrain` spanning
/// `2 * half_extent` meters, centred on the ECEF point `centre`.
pub fn terrain_patch(
    terrain: &RollingHills,
    centre: DVec3,
    half_extent: f64,
    resolution: u32,
) -> Mesh {
    let resolution = resolution.max(2);
    let points = surface_points(terrain, centre, half_extent, resolution);

    let positions: Vec<[f32; 3]> = points
        .iter()
        .map(|p| (*p - centre).as_vec3().to_array())
        .collect();
    let indices = grid_indices(resolution);
    let normals = vertex_normals(&positions, &indices);

    let heights: Vec<f64> = points.iter().map(|p| geo::height_of(*p)).collect();
    let (low, high) = heights
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
            (lo.min(*h), hi.max(*h))
        });
    let span = (high - low).max(f64::EPSILON);
    #[allow(clippy::cast_possible_truncation)]
    let colors: Vec<[f32; 4]> = heights
        .iter()
        .map(|h| {
            let t = ((h - low) / span) as f32;
            std::array::from_fn(|i| LOW_COLOR[i] + (HIGH_COLOR[i] - LOW_COLOR[i]) * t)
        })
        .collect();

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// ECEF surface points of the grid, row by row from south-west.
fn surface_points(
    terrain: &RollingHills,
    centre: DVec3,
    half_extent: f64,
    resolution: u32,
) -> Vec<DVec3> {
    let frame = EnuFrame::from_ecef(centre);
    let step = 2.0 * half_extent / f64::from(resolution - 1);

    (0..resolution)
        .flat_map(|row| (0..resolution).map(move |col| (row, col)))
        .map(|(row, col)| {
            let east = -half_extent + f64::from(col) * step;
            let north = -half_extent + f64::from(row) * step;
            let g = geo::ecef_to_geodetic(frame.to_world(DVec3::new(east, north, 0.0)));
            g.with_height(terrain.height_at(g.longitude, g.latitude))
                .to_ecef()
        })
        .collect()
}

/// Triangle list for a square grid, counter-clockwise seen from above.
fn grid_indices(resolution: u32) -> Vec<u32> {
    let cells = resolution - 1;
    let mut indices = Vec::with_capacity((cells * cells * 6) as usize);
    for row in 0..cells {
        for col in 0..cells {
            let a = row * resolution + col;
            let b = a + 1;
            let c = a + resolution;
            let d = c + 1;
            indices.extend([a, b, d, a, d, c]);
        }
    }
    indices
}

/// Area-weighted vertex normals.
fn vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
        let pa = Vec3::from_array(positions[a]);
        let face = (Vec3::from_array(positions[b]) - pa).cross(Vec3::from_array(positions[c]) - pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.normalize_or_zero().to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use geodrive::Geodetic;

    use super::*;

    #[test]
    fn test_grid_indices() {
        let indices = grid_indices(4);
        assert_eq!(indices.len(), 3 * 3 * 6);
        assert!(indices.iter().all(|i| *i < 16));
        assert_eq!(&indices[..6], &[0, 1, 5, 0, 5, 4]);
    }

    #[test]
    fn test_patch_follows_terrain() {
        let terrain = RollingHills::new(11.9746, 57.7089, 40.0, 3);
        let centre = Geodetic::new(11.9746, 57.7089, 40.0).to_ecef();
        let points = surface_points(&terrain, centre, 500.0, 5);
        assert_eq!(points.len(), 25);
        for p in &points {
            assert!(terrain.clearance(*p).abs() < 1.0e-4);
        }

        // Corners are roughly `half_extent` away horizontally.
        let frame = EnuFrame::from_ecef(centre);
        let corner = frame.to_local(points[0]);
        assert!((corner.x + 500.0).abs() < 1.0);
        assert!((corner.y + 500.0).abs() < 1.0);
    }

    #[test]
    fn test_normals_point_up() {
        let terrain = RollingHills::new(11.9746, 57.7089, 40.0, 3);
        let centre = Geodetic::new(11.9746, 57.7089, 40.0).to_ecef();
        let mesh = terrain_patch(&terrain, centre, 200.0, 9);
        let up = EnuFrame::from_ecef(centre).up.as_vec3();

        let Some(bevy::mesh::VertexAttributeValues::Float32x3(normals)) =
            mesh.attribute(Mesh::ATTRIBUTE_NORMAL)
        else {
            panic!("missing normals");
        };
        assert_eq!(normals.len(), 81);
        assert!(
            normals
                .iter()
                .all(|n| Vec3::from_array(*n).dot(up) > 0.5)
        );
    }
}
