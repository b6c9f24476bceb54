//! Floating origin for rendering ECEF positions with f32 precision.
//!
//! Earth coordinates are millions of meters, which causes f32 precision issues.
//! Positions are stored in f64 and rendered relative to the camera, keeping all
//! rendered positions within f32 precision range.

use bevy::prelude::*;
use bevy::transform::TransformSystems;
use glam::DVec3;

/// Plugin for floating origin coordinate system.
pub struct FloatingOriginPlugin;

impl Plugin for FloatingOriginPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FloatingOrigin>().add_systems(
            PostUpdate,
            (follow_camera, update_transforms_relative_to_origin)
                .chain()
                .before(TransformSystems::Propagate),
        );
    }
}

/// The floating origin position in world (ECEF) coordinates.
#[derive(Resource, Default)]
pub struct FloatingOrigin {
    /// Current origin position in ECEF coordinates (meters).
    pub position: DVec3,
}

/// High-precision world position for an entity.
///
/// The entity's `Transform` translation is rewritten every frame to be
/// relative to the [`FloatingOrigin`].
#[derive(Component, Clone, Debug)]
pub struct WorldPosition {
    /// Position in ECEF coordinates (meters).
    pub position: DVec3,
}

impl WorldPosition {
    pub fn from_dvec3(position: DVec3) -> Self {
        Self { position }
    }
}

/// Marker for the camera that defines the floating origin.
///
/// The camera itself always renders from the origin.
#[derive(Component)]
pub struct FloatingOriginCamera {
    /// Camera's world position in ECEF coordinates (meters).
    pub position: DVec3,
}

impl FloatingOriginCamera {
    pub fn new(position: DVec3) -> Self {
        Self { position }
    }
}

fn follow_camera(
    mut origin: ResMut<FloatingOrigin>,
    mut cameras: Query<(&FloatingOriginCamera, &mut Transform)>,
) {
    let Ok((camera, mut transform)) = cameras.single_mut() else {
        return;
    };
    origin.position = camera.position;
    transform.translation = Vec3::ZERO;
}

fn update_transforms_relative_to_origin(
    origin: Res<FloatingOrigin>,
    mut query: Query<(&WorldPosition, &mut Transform), Without<FloatingOriginCamera>>,
) {
    for (world_pos, mut transform) in &mut query {
        // Relative coordinates are small enough for f32.
        transform.translation = (world_pos.position - origin.position).as_vec3();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_render_relative_to_camera() {
        let mut app = App::new();
        app.add_plugins(FloatingOriginPlugin);

        let camera_pos = DVec3::new(3_300_000.0, 700_000.0, 5_300_000.0);
        app.world_mut().spawn((
            FloatingOriginCamera::new(camera_pos),
            Transform::from_xyz(5.0, 5.0, 5.0),
        ));
        let entity = app
            .world_mut()
            .spawn((
                WorldPosition::from_dvec3(camera_pos + DVec3::new(10.0, -2.0, 0.5)),
                Transform::default(),
            ))
            .id();

        app.update();

        let transform = app.world().get::<Transform>(entity).unwrap();
        assert!(
            transform
                .translation
                .abs_diff_eq(Vec3::new(10.0, -2.0, 0.5), 1.0e-4)
        );
        assert_eq!(app.world().resource::<FloatingOrigin>().position, camera_pos);

        let mut cameras = app
            .world_mut()
            .query_filtered::<&Transform, With<FloatingOriginCamera>>();
        let camera_transform = cameras.single(app.world()).unwrap();
        assert_eq!(camera_transform.translation, Vec3::ZERO);
    }
}
