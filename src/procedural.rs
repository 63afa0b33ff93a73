//! Basic procedural patches: lines, arcs, rings, rectangles and slabs.
use crate::control::{ControlGrid, ControlPoint};
use crate::error::IgaError;
use crate::grid_function::CONTROL_POINT;
use crate::patch::Patch;
use crate::patch_utility::{create_loft_patch, create_loft_patch_from_pair};
use crate::space::BSplinesFESpace;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3, U1, U2, U3};
use std::f64::consts::FRAC_PI_2;

/// The coordinate axis normal to the plane of a planar curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateAxis {
    X,
    Y,
    Z,
}

/// A straight line from `start` to `end` as a single Bezier segment of the given order.
pub fn create_line(start: &Point3<f64>, end: &Point3<f64>, order: usize) -> Result<Patch<U1>, IgaError> {
    let space = BSplinesFESpace::<U1>::primitive(&[order])?;
    let grid = ControlGrid::linear_control_points(start, space.number(0), end);
    let mut line = Patch::new(0, space);
    line.create_control_point_grid_function(grid)?;
    Ok(line)
}

/// A B-spline curve with the given unit-weight control points and a uniform open knot vector.
pub fn create_curve(points: &[Point3<f64>], order: usize) -> Result<Patch<U1>, IgaError> {
    let space = BSplinesFESpace::<U1>::uniform(&[points.len()], &[order])?;
    let values = points
        .iter()
        .map(|p| ControlPoint::from_point(p, 1.0))
        .collect();
    let grid = ControlGrid::structured(CONTROL_POINT, vec![points.len()], values)?;
    let mut curve = Patch::new(0, space);
    curve.create_control_point_grid_function(grid)?;
    Ok(curve)
}

/// An exact circular arc as a quadratic NURBS curve with knots `[0, 0, 0, 1, 1, 1]`.
///
/// The arc lies in the plane through `center` normal to `axis` and runs counterclockwise from
/// `start_angle` to `end_angle` (in degrees). The opening angle must be below 180 degrees.
pub fn create_small_arc(
    center: &Point3<f64>,
    axis: CoordinateAxis,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
) -> Result<Patch<U1>, IgaError> {
    let sweep = end_angle - start_angle;
    if !(sweep.abs() > 0.0 && sweep.abs() < 180.0) {
        return Err(IgaError::InvalidArgument(format!(
            "a small arc needs an opening angle in (0, 180) degrees, got {sweep}"
        )));
    }
    let half_sweep = 0.5 * sweep.to_radians();
    let wm = half_sweep.cos();
    let x = radius * wm;
    let y = radius * half_sweep.sin();
    let xm = x + y * half_sweep.tan();

    // The arc is built symmetric about the x axis in the xy plane, then rotated into place.
    let mid_angle = (start_angle + 0.5 * sweep).to_radians();
    let rotation = match axis {
        CoordinateAxis::Z => UnitQuaternion::from_axis_angle(&Vector3::z_axis(), mid_angle),
        CoordinateAxis::Y => {
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2)
                * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), mid_angle)
        }
        CoordinateAxis::X => {
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2)
                * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), mid_angle + FRAC_PI_2)
        }
    };
    let transformation = Isometry3::from_parts(Translation3::from(center.coords), rotation);

    let mut points = vec![
        ControlPoint::new(x, -y, 0.0, 1.0),
        ControlPoint::new(xm, 0.0, 0.0, wm),
        ControlPoint::new(x, y, 0.0, 1.0),
    ];
    for point in &mut points {
        point.apply_transformation(&transformation);
    }

    let space = BSplinesFESpace::<U1>::primitive(&[2])?;
    let grid = ControlGrid::structured(CONTROL_POINT, vec![3], points)?;
    let mut arc = Patch::new(0, space);
    arc.create_control_point_grid_function(grid)?;
    Ok(arc)
}

/// The region between two concentric small arcs.
///
/// The first parametric direction runs along the arcs, the second from the inner arc to the
/// outer one.
pub fn create_small_ring(
    center: &Point3<f64>,
    axis: CoordinateAxis,
    inner_radius: f64,
    outer_radius: f64,
    start_angle: f64,
    end_angle: f64,
) -> Result<Patch<U2>, IgaError> {
    let inner = create_small_arc(center, axis, inner_radius, start_angle, end_angle)?;
    let outer = create_small_arc(center, axis, outer_radius, start_angle, end_angle)?;
    create_loft_patch_from_pair(&inner, &outer)
}

/// Bilinear rectangle in the plane `z = start.z`, spanned by the two corners.
pub fn create_rectangle(start: &Point3<f64>, end: &Point3<f64>) -> Result<Patch<U2>, IgaError> {
    let bottom = create_line(start, &Point3::new(end.x, start.y, start.z), 1)?;
    let top = create_line(
        &Point3::new(start.x, end.y, start.z),
        &Point3::new(end.x, end.y, start.z),
        1,
    )?;
    create_loft_patch_from_pair(&bottom, &top)
}

/// Bilinear quadrilateral with corners given counterclockwise.
///
/// ```text
///   p4 --- p3
///   |      |
///   p1 --- p2
/// ```
pub fn create_parallelogram(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    p4: &Point3<f64>,
) -> Result<Patch<U2>, IgaError> {
    let bottom = create_line(p1, p2, 1)?;
    let top = create_line(p4, p3, 1)?;
    create_loft_patch_from_pair(&bottom, &top)
}

/// Trilinear axis-aligned box spanned by two opposite corners.
pub fn create_slab(start: &Point3<f64>, end: &Point3<f64>) -> Result<Patch<U3>, IgaError> {
    let bottom = create_rectangle(start, &Point3::new(end.x, end.y, start.z))?;
    let top = create_rectangle(&Point3::new(start.x, start.y, end.z), end)?;
    create_loft_patch(&[&bottom, &top], 1)
}
