//! Hierarchical transforms.
//!
//! A [`Transform`] holds a local pose (position, rotation, scale) and an
//! optional weak link to a parent node. World-space queries walk the parent
//! chain and recompute on every call; nothing is cached, so there is no
//! invalidation protocol and no stale state to manage. The node alias is
//! `Rc`-based and single-threaded by construction.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use math::{
    vec::Vec3,
    quat::Quat,
    mat::Mat4,
};

/// Shared handle for nodes that participate in a hierarchy. Parents are
/// referenced weakly, so dropping the host's handle releases the node even
/// while children still point at it (they then behave as roots).
pub type TransformRef = Rc<RefCell<Transform>>;

/// Coordinate space for [`Transform::translate`] and [`Transform::rotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Relative to the node's own axes.
    Local,
    /// Relative to the world axes.
    World,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    WouldCreateCycle,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransformError::WouldCreateCycle => {
                write!(f, "reparenting would make the node its own ancestor")
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// A node in a transform hierarchy.
///
/// The local fields are plain data the host may assign freely. The parent
/// link is only reachable through [`parent`](Self::parent) and
/// [`set_parent`](Self::set_parent) so the no-cycles invariant cannot be
/// bypassed.
#[derive(Debug)]
pub struct Transform {
    pub local_position: Vec3,
    pub local_rotation: Quat,
    pub local_scale: Vec3,
    parent: Option<Weak<RefCell<Transform>>>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    pub fn new() -> Transform {
        Transform {
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
            local_scale: Vec3::ONE,
            parent: None,
        }
    }

    #[inline]
    pub fn into_shared(self) -> TransformRef {
        Rc::new(RefCell::new(self))
    }

    /// The parent node, if one is set and still alive.
    pub fn parent(&self) -> Option<TransformRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        match self.parent() {
            Some(p) => p.borrow().local_to_world_matrix().multiply_point(self.local_position),
            None => self.local_position,
        }
    }

    /// Moves the node to a world-space position by solving for the local one.
    pub fn set_position(&mut self, value: Vec3) {
        self.local_position = match self.parent() {
            Some(p) => p.borrow().world_to_local_matrix().multiply_point3x4(value),
            None => value,
        };
    }

    /// World-space rotation.
    pub fn rotation(&self) -> Quat {
        match self.parent() {
            Some(p) => p.borrow().rotation() * self.local_rotation,
            None => self.local_rotation,
        }
    }

    /// Sets the world-space rotation by solving for the local one.
    pub fn set_rotation(&mut self, value: Quat) {
        self.local_rotation = match self.parent() {
            Some(p) => p.borrow().rotation().inverse() * value,
            None => value,
        };
    }

    /// World-space scale, combined component-wise down the chain. Exact only
    /// while no ancestor is rotated against its scale axes; under arbitrary
    /// rotation it is an approximation, hence "lossy".
    pub fn lossy_scale(&self) -> Vec3 {
        match self.parent() {
            Some(p) => p.borrow().lossy_scale() * self.local_scale,
            None => self.local_scale,
        }
    }

    pub fn local_euler_angles(&self) -> Vec3 {
        self.local_rotation.euler_angles()
    }

    /// Commits an Euler-angle edit (degrees) to the local rotation. This is
    /// the explicit entry point for hosts that edit angles instead of
    /// quaternions.
    pub fn set_local_euler_angles(&mut self, degrees: Vec3) {
        self.local_rotation = Quat::euler(degrees);
    }

    pub fn local_to_world_matrix(&self) -> Mat4 {
        let local = Mat4::trs(self.local_position, self.local_rotation, self.local_scale);
        match self.parent() {
            Some(p) => p.borrow().local_to_world_matrix() * local,
            None => local,
        }
    }

    pub fn world_to_local_matrix(&self) -> Mat4 {
        self.local_to_world_matrix().inverse()
    }

    /// Attaches the node to `new_parent` (or detaches it when `None`).
    ///
    /// With `world_position_stays` the node's world pose is captured before
    /// the link changes and the local fields are re-derived against the new
    /// parent, so position, rotation and (up to the lossy approximation)
    /// scale are preserved. Without it only the link changes, which is the
    /// cheap variant for hosts that re-seed the local fields themselves.
    ///
    /// Refuses to create a cycle.
    pub fn set_parent(
        &mut self,
        new_parent: Option<&TransformRef>,
        world_position_stays: bool,
    ) -> Result<(), TransformError> {
        let current = self.parent();
        match (&current, new_parent) {
            (None, None) => return Ok(()),
            (Some(cur), Some(np)) if Rc::ptr_eq(cur, np) => return Ok(()),
            _ => {}
        }

        if let Some(np) = new_parent {
            let self_ptr: *const Transform = self;
            let mut cursor = Some(Rc::clone(np));
            while let Some(node) = cursor {
                if std::ptr::eq(node.as_ptr() as *const Transform, self_ptr) {
                    log::warn!("set_parent refused: node would become its own ancestor");
                    return Err(TransformError::WouldCreateCycle);
                }
                cursor = node.borrow().parent();
            }
        }

        // world pose under the old parent, read before the link changes
        let captured = if world_position_stays {
            Some((self.position(), self.rotation(), self.lossy_scale()))
        } else {
            None
        };

        self.parent = new_parent.map(Rc::downgrade);

        let Some((world_position, world_rotation, world_scale)) = captured else {
            return Ok(());
        };

        match new_parent {
            Some(p) => {
                let p = p.borrow();
                self.local_position =
                    p.world_to_local_matrix().multiply_point3x4(world_position);
                self.local_rotation = p.rotation().inverse() * world_rotation;
                self.local_scale = world_scale / p.lossy_scale();
            }
            None => {
                self.local_position = world_position;
                self.local_rotation = world_rotation;
                self.local_scale = world_scale;
            }
        }
        Ok(())
    }

    /// Whether `ancestor` appears on this node's parent chain. A node is
    /// considered a child of itself.
    pub fn is_child_of(&self, ancestor: &TransformRef) -> bool {
        if std::ptr::eq(ancestor.as_ptr() as *const Transform, self) {
            return true;
        }
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if Rc::ptr_eq(&node, ancestor) {
                return true;
            }
            cursor = node.borrow().parent();
        }
        false
    }

    /// Topmost ancestor, or `None` when this node is already a root.
    pub fn root(&self) -> Option<TransformRef> {
        let mut cursor = self.parent()?;
        loop {
            let next = cursor.borrow().parent();
            match next {
                Some(n) => cursor = n,
                None => return Some(cursor),
            }
        }
    }

    /// Local point to world space.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.local_to_world_matrix().multiply_point(point)
    }

    /// World point to local space.
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.world_to_local_matrix().multiply_point(point)
    }

    /// Local direction to world space; unaffected by scale and translation.
    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation() * direction
    }

    pub fn inverse_transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation().inverse() * direction
    }

    /// Local vector to world space; rotated and scaled, not translated.
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.local_to_world_matrix().multiply_vector(vector)
    }

    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.world_to_local_matrix().multiply_vector(vector)
    }

    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::RIGHT
    }

    pub fn set_right(&mut self, value: Vec3) {
        self.set_rotation(Quat::from_to_rotation(Vec3::RIGHT, value));
    }

    pub fn up(&self) -> Vec3 {
        self.rotation() * Vec3::UP
    }

    pub fn set_up(&mut self, value: Vec3) {
        self.set_rotation(Quat::from_to_rotation(Vec3::UP, value));
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::FORWARD
    }

    pub fn set_forward(&mut self, value: Vec3) {
        self.set_rotation(Quat::look_rotation(value, Vec3::UP));
    }

    /// Moves the node by `delta`, interpreted in `space`.
    pub fn translate(&mut self, delta: Vec3, space: Space) {
        let world_delta = match space {
            Space::World => delta,
            Space::Local => self.transform_direction(delta),
        };
        let target = self.position() + world_delta;
        self.set_position(target);
    }

    /// Rotates the node by Euler angles in degrees, interpreted in `space`.
    pub fn rotate(&mut self, eulers: Vec3, space: Space) {
        let q = Quat::euler(eulers);
        match space {
            Space::Local => self.local_rotation = self.local_rotation * q,
            Space::World => {
                let r = q * self.rotation();
                self.set_rotation(r);
            }
        }
    }

    /// Orbits the node around a world-space `point`, rotating its own
    /// orientation along with it.
    pub fn rotate_around(&mut self, point: Vec3, axis: Vec3, degrees: f32) {
        let q = Quat::angle_axis(degrees, axis);
        let orbited = point + q * (self.position() - point);
        self.set_position(orbited);
        let r = q * self.rotation();
        self.set_rotation(r);
    }

    /// Points the forward axis at a world-space target.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let r = Quat::look_rotation(target - self.position(), up);
        self.set_rotation(r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-3);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-3);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-3);
    }

    fn assert_mat4_eq(a: Mat4, b: Mat4) {
        for i in 0..16 {
            assert_relative_eq!(a[i], b[i], epsilon = 1e-3);
        }
    }

    fn node_at(position: Vec3) -> TransformRef {
        let mut t = Transform::new();
        t.local_position = position;
        t.into_shared()
    }

    #[test]
    fn a_new_node_is_an_identity_root() {
        let t = Transform::new();
        assert_eq!(t.position(), Vec3::ZERO);
        assert_eq!(t.rotation(), Quat::IDENTITY);
        assert_eq!(t.lossy_scale(), Vec3::ONE);
        assert!(t.parent().is_none());
        assert!(t.local_to_world_matrix().is_identity());
    }

    #[test]
    fn child_position_composes_through_the_parent() {
        let root = node_at(Vec3::new(0.0, 0.0, 0.0));
        let child = Transform::new().into_shared();
        {
            let mut c = child.borrow_mut();
            c.local_position = Vec3::new(1.0, 0.0, 0.0);
            c.set_parent(Some(&root), true).unwrap();
        }
        assert_vec3_eq(child.borrow().position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn reparenting_to_a_moved_grandparent_preserves_world_position() {
        let root = node_at(Vec3::ZERO);
        let child = Transform::new().into_shared();
        {
            let mut c = child.borrow_mut();
            c.local_position = Vec3::new(1.0, 0.0, 0.0);
            c.set_parent(Some(&root), true).unwrap();
        }

        let grandparent = node_at(Vec3::new(0.0, 5.0, 0.0));
        child.borrow_mut().set_parent(Some(&grandparent), true).unwrap();

        let c = child.borrow();
        assert_vec3_eq(c.position(), Vec3::new(1.0, 0.0, 0.0));
        assert_vec3_eq(c.local_position, Vec3::new(1.0, -5.0, 0.0));
    }

    #[test]
    fn reparenting_preserves_pose_under_rotation_and_scale() {
        let parent = Transform::new().into_shared();
        {
            let mut p = parent.borrow_mut();
            p.local_position = Vec3::new(3.0, -1.0, 2.0);
            p.local_rotation = Quat::euler(Vec3::new(0.0, 90.0, 0.0));
            p.local_scale = Vec3::new(2.0, 2.0, 2.0);
        }

        let node = Transform::new().into_shared();
        {
            let mut n = node.borrow_mut();
            n.local_position = Vec3::new(1.0, 2.0, 3.0);
            n.local_rotation = Quat::euler(Vec3::new(30.0, 0.0, 0.0));
        }

        let before_pos = node.borrow().position();
        let before_rot = node.borrow().rotation();

        node.borrow_mut().set_parent(Some(&parent), true).unwrap();

        assert_vec3_eq(node.borrow().position(), before_pos);
        assert!(node.borrow().rotation().approx_eq(before_rot));
    }

    #[test]
    fn detaching_preserves_the_world_pose() {
        let parent = Transform::new().into_shared();
        {
            let mut p = parent.borrow_mut();
            p.local_position = Vec3::new(0.0, 10.0, 0.0);
            p.local_rotation = Quat::euler(Vec3::new(0.0, 45.0, 0.0));
        }

        let node = Transform::new().into_shared();
        {
            let mut n = node.borrow_mut();
            n.local_position = Vec3::new(2.0, 0.0, 0.0);
            n.set_parent(Some(&parent), false).unwrap();
        }

        let world = node.borrow().position();
        node.borrow_mut().set_parent(None, true).unwrap();

        let n = node.borrow();
        assert!(n.parent().is_none());
        assert_vec3_eq(n.position(), world);
        assert_vec3_eq(n.local_position, world);
    }

    #[test]
    fn fast_reparent_keeps_local_fields_and_moves_the_node() {
        let parent = node_at(Vec3::new(0.0, 5.0, 0.0));
        let node = Transform::new().into_shared();
        node.borrow_mut().local_position = Vec3::new(1.0, 0.0, 0.0);

        node.borrow_mut().set_parent(Some(&parent), false).unwrap();

        let n = node.borrow();
        assert_vec3_eq(n.local_position, Vec3::new(1.0, 0.0, 0.0));
        assert_vec3_eq(n.position(), Vec3::new(1.0, 5.0, 0.0));
    }

    #[test]
    fn reparenting_to_the_same_parent_is_a_nop() {
        let parent = node_at(Vec3::new(0.0, 1.0, 0.0));
        let node = Transform::new().into_shared();
        node.borrow_mut().set_parent(Some(&parent), true).unwrap();

        let before = node.borrow().local_position;
        node.borrow_mut().set_parent(Some(&parent), true).unwrap();
        assert_eq!(node.borrow().local_position, before);
    }

    #[test]
    fn reparenting_onto_a_descendant_is_refused() {
        let root = Transform::new().into_shared();
        let child = Transform::new().into_shared();
        child.borrow_mut().set_parent(Some(&root), true).unwrap();

        let err = root.borrow_mut().set_parent(Some(&child), true);
        assert_eq!(err, Err(TransformError::WouldCreateCycle));
        assert!(root.borrow().parent().is_none());

        let err = root.borrow_mut().set_parent(Some(&root), true);
        assert_eq!(err, Err(TransformError::WouldCreateCycle));
    }

    #[test]
    fn world_and_local_matrices_are_inverses() {
        let root = Transform::new().into_shared();
        {
            let mut r = root.borrow_mut();
            r.local_position = Vec3::new(1.0, 2.0, 3.0);
            r.local_rotation = Quat::euler(Vec3::new(10.0, 20.0, 30.0));
            r.local_scale = Vec3::new(2.0, 1.0, 0.5);
        }
        let child = Transform::new().into_shared();
        {
            let mut c = child.borrow_mut();
            c.local_position = Vec3::new(-4.0, 0.0, 1.0);
            c.local_rotation = Quat::euler(Vec3::new(0.0, 45.0, 0.0));
            c.set_parent(Some(&root), false).unwrap();
        }

        let c = child.borrow();
        assert_mat4_eq(
            c.world_to_local_matrix() * c.local_to_world_matrix(),
            Mat4::IDENTITY,
        );
    }

    #[test]
    fn rotations_compose_down_the_chain() {
        let parent = Transform::new().into_shared();
        parent.borrow_mut().local_rotation = Quat::angle_axis(90.0, Vec3::UP);

        let child = Transform::new().into_shared();
        {
            let mut c = child.borrow_mut();
            c.local_rotation = Quat::angle_axis(90.0, Vec3::UP);
            c.set_parent(Some(&parent), false).unwrap();
        }

        let expected = Quat::angle_axis(180.0, Vec3::UP);
        assert!(child.borrow().rotation().approx_eq(expected));
    }

    #[test]
    fn lossy_scale_multiplies_down_the_chain() {
        let parent = Transform::new().into_shared();
        parent.borrow_mut().local_scale = Vec3::new(2.0, 3.0, 4.0);

        let child = Transform::new().into_shared();
        {
            let mut c = child.borrow_mut();
            c.local_scale = Vec3::new(0.5, 1.0, 2.0);
            c.set_parent(Some(&parent), false).unwrap();
        }

        assert_vec3_eq(child.borrow().lossy_scale(), Vec3::new(1.0, 3.0, 8.0));
    }

    #[test]
    fn transform_point_round_trips_through_its_inverse() {
        let node = Transform::new().into_shared();
        {
            let mut n = node.borrow_mut();
            n.local_position = Vec3::new(5.0, 1.0, -2.0);
            n.local_rotation = Quat::euler(Vec3::new(15.0, 75.0, -30.0));
            n.local_scale = Vec3::new(2.0, 2.0, 2.0);
        }

        let n = node.borrow();
        let p = Vec3::new(1.0, -1.0, 2.5);
        assert_vec3_eq(n.inverse_transform_point(n.transform_point(p)), p);
        // the origin of local space lands at the node's world position
        assert_vec3_eq(n.transform_point(Vec3::ZERO), n.position());
    }

    #[test]
    fn directions_ignore_scale_and_translation() {
        let node = Transform::new().into_shared();
        {
            let mut n = node.borrow_mut();
            n.local_position = Vec3::new(100.0, 0.0, 0.0);
            n.local_rotation = Quat::angle_axis(90.0, Vec3::UP);
            n.local_scale = Vec3::new(10.0, 10.0, 10.0);
        }

        let n = node.borrow();
        assert_vec3_eq(n.transform_direction(Vec3::FORWARD), Vec3::RIGHT);
        // vectors pick up the scale but still not the translation
        assert_vec3_eq(n.transform_vector(Vec3::FORWARD), Vec3::RIGHT * 10.0);
    }

    #[test]
    fn axis_accessors_follow_the_rotation() {
        let node = Transform::new().into_shared();
        node.borrow_mut().local_rotation = Quat::angle_axis(90.0, Vec3::UP);

        let n = node.borrow();
        assert_vec3_eq(n.forward(), Vec3::RIGHT);
        assert_vec3_eq(n.right(), Vec3::BACK);
        assert_vec3_eq(n.up(), Vec3::UP);
    }

    #[test]
    fn set_forward_points_the_forward_axis() {
        let node = Transform::new().into_shared();
        node.borrow_mut().set_forward(Vec3::new(1.0, 0.0, 1.0));
        let dir = Vec3::new(1.0, 0.0, 1.0).normalized();
        assert_vec3_eq(node.borrow().forward(), dir);
    }

    #[test]
    fn translate_in_local_space_moves_along_the_node_axes() {
        let node = Transform::new().into_shared();
        {
            let mut n = node.borrow_mut();
            n.local_rotation = Quat::angle_axis(90.0, Vec3::UP);
            n.translate(Vec3::FORWARD, Space::Local);
            n.translate(Vec3::FORWARD, Space::World);
        }
        // local forward is world right after the 90 degree turn
        assert_vec3_eq(node.borrow().position(), Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn rotate_in_world_space_prepends_the_rotation() {
        let parent = Transform::new().into_shared();
        parent.borrow_mut().local_rotation = Quat::angle_axis(45.0, Vec3::UP);

        let node = Transform::new().into_shared();
        {
            let mut n = node.borrow_mut();
            n.set_parent(Some(&parent), false).unwrap();
            n.rotate(Vec3::new(0.0, 45.0, 0.0), Space::World);
        }

        let expected = Quat::angle_axis(90.0, Vec3::UP);
        assert!(node.borrow().rotation().approx_eq(expected));
    }

    #[test]
    fn rotate_around_orbits_the_pivot() {
        let node = Transform::new().into_shared();
        node.borrow_mut().local_position = Vec3::new(2.0, 0.0, 0.0);

        node.borrow_mut()
            .rotate_around(Vec3::ZERO, Vec3::UP, 90.0);

        let n = node.borrow();
        assert_vec3_eq(n.position(), Vec3::new(0.0, 0.0, -2.0));
        assert!(n.rotation().approx_eq(Quat::angle_axis(90.0, Vec3::UP)));
    }

    #[test]
    fn look_at_faces_the_target() {
        let node = Transform::new().into_shared();
        node.borrow_mut().local_position = Vec3::new(0.0, 0.0, -5.0);
        node.borrow_mut().look_at(Vec3::ZERO, Vec3::UP);

        assert_vec3_eq(node.borrow().forward(), Vec3::FORWARD);
    }

    #[test]
    fn ancestry_queries_walk_the_chain() {
        let root = Transform::new().into_shared();
        let mid = Transform::new().into_shared();
        let leaf = Transform::new().into_shared();
        mid.borrow_mut().set_parent(Some(&root), true).unwrap();
        leaf.borrow_mut().set_parent(Some(&mid), true).unwrap();

        assert!(leaf.borrow().is_child_of(&mid));
        assert!(leaf.borrow().is_child_of(&root));
        assert!(leaf.borrow().is_child_of(&leaf));
        assert!(!root.borrow().is_child_of(&leaf));

        assert!(Rc::ptr_eq(&leaf.borrow().root().unwrap(), &root));
        assert!(root.borrow().root().is_none());
    }

    #[test]
    fn a_dropped_parent_leaves_the_child_a_root() {
        let node = Transform::new().into_shared();
        {
            let parent = node_at(Vec3::new(0.0, 7.0, 0.0));
            node.borrow_mut().set_parent(Some(&parent), false).unwrap();
            assert_vec3_eq(node.borrow().position(), Vec3::new(0.0, 7.0, 0.0));
        }
        // the weak link no longer upgrades
        assert!(node.borrow().parent().is_none());
        assert_vec3_eq(node.borrow().position(), Vec3::ZERO);
    }

    #[test]
    fn euler_edits_commit_to_the_local_rotation() {
        let node = Transform::new().into_shared();
        node.borrow_mut()
            .set_local_euler_angles(Vec3::new(0.0, 90.0, 0.0));

        let n = node.borrow();
        assert!(n.local_rotation.approx_eq(Quat::angle_axis(90.0, Vec3::UP)));
        assert_vec3_eq(n.local_euler_angles(), Vec3::new(0.0, 90.0, 0.0));
    }
}
