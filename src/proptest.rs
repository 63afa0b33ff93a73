//! Strategies for knot vectors, spaces and patches.
use crate::control::{ControlGrid, ControlPoint};
use crate::grid_function::CONTROL_POINT;
use crate::patch::Patch;
use crate::space::knots::KnotVector;
use crate::space::BSplinesFESpace;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::{DimName, Point3};

pub fn point3() -> impl Strategy<Value = Point3<f64>> {
    // Keep coordinates moderate so that rational evaluation stays well conditioned
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

pub fn control_point() -> impl Strategy<Value = ControlPoint> {
    (point3(), 0.5..2.0).prop_map(|(p, w)| ControlPoint::from_point(&p, w))
}

/// Open knot vector on `[0, 1]` with up to `max_interior_knots` random simple interior knots.
pub fn open_knot_vector(order: usize, max_interior_knots: usize) -> impl Strategy<Value = KnotVector> {
    vec(0.05..0.95, 0..=max_interior_knots).prop_filter_map("knots must be valid", move |mut interior| {
        interior.sort_by(|a: &f64, b| a.total_cmp(b));
        let mut knots = vec![0.0; order + 1];
        knots.extend(interior);
        knots.extend(std::iter::repeat(1.0).take(order + 1));
        KnotVector::new(knots).ok()
    })
}

/// Knots suitable for insertion into a knot vector on `[0, 1]`.
pub fn interior_knots(max_count: usize) -> impl Strategy<Value = Vec<f64>> {
    vec(0.01..0.99, 0..=max_count)
}

pub fn parametric_point<D: DimName>() -> impl Strategy<Value = Vec<f64>> {
    vec(0.0..=1.0, D::dim())
}

pub fn bsplines_space<D: DimName>(
    max_order: usize,
    max_interior_knots: usize,
) -> impl Strategy<Value = BSplinesFESpace<D>> {
    vec(1..=max_order, D::dim())
        .prop_flat_map(move |orders| {
            let knots: Vec<_> = orders
                .iter()
                .map(|&p| open_knot_vector(p, max_interior_knots))
                .collect();
            (Just(orders), knots)
        })
        .prop_filter_map("space must be valid", |(orders, knots)| BSplinesFESpace::new(knots, orders).ok())
}

/// A patch with id 0, random rational control points and no further grid functions.
pub fn bsplines_patch<D: DimName>(max_order: usize, max_interior_knots: usize) -> impl Strategy<Value = Patch<D>> {
    bsplines_space::<D>(max_order, max_interior_knots)
        .prop_flat_map(|space| {
            let points = vec(control_point(), space.numbers().iter().product::<usize>());
            (Just(space), points)
        })
        .prop_filter_map("patch must be valid", |(space, points)| {
            let grid = ControlGrid::structured(CONTROL_POINT, space.numbers(), points).ok()?;
            let mut patch = Patch::new(0, space);
            patch.create_control_point_grid_function(grid).ok()?;
            Some(patch)
        })
}
