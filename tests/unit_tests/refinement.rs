use crate::{boundary_points, two_by_two_squares, two_unit_squares, unit_square};
use fenris_iga::control::ControlGrid;
use fenris_iga::error::IgaError;
use fenris_iga::multipatch::MultiPatch;
use fenris_iga::patch_utility::{make_interface_2d, make_interface_3d};
use fenris_iga::procedural::{create_parallelogram, create_slab, create_small_arc, CoordinateAxis};
use fenris_iga::proptest::{bsplines_patch, interior_knots};
use fenris_iga::refinement::detail::{bezier_decomposition, degree_elevation_operator, knot_insertion_operator};
use fenris_iga::refinement::{
    degree_elevate, degree_elevate_standalone, degree_elevate_with_transformations, insert_knots,
    insert_knots_standalone, insert_knots_with_transformations,
};
use fenris_iga::space::knots::KnotVector;
use fenris_iga::space::BoundaryDirection::{Forward, Reversed};
use fenris_iga::space::BoundarySide;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{dmatrix, DMatrix, Point3, U2};
use proptest::prelude::*;
use std::collections::BTreeSet;
use util::{assert_knots_approx_eq, assert_points_approx_eq, max_point_distance, parametric_grid, uniform_samples};

fn linear_segment() -> KnotVector {
    KnotVector::uniform_open(2, 1).unwrap()
}

#[test]
fn single_knot_insertion_operator() {
    let (knots, t) = knot_insertion_operator(&linear_segment(), 1, &[0.5]).unwrap();
    assert_eq!(knots.as_slice(), &[0.0, 0.0, 0.5, 1.0, 1.0]);
    let expected = dmatrix![1.0, 0.0;
                            0.5, 0.5;
                            0.0, 1.0];
    assert_matrix_eq!(DMatrix::from(&t), expected, comp = abs, tol = 1e-15);
}

#[test]
fn knots_are_inserted_in_sorted_order() {
    let (knots, t) = knot_insertion_operator(&linear_segment(), 1, &[0.75, 0.25]).unwrap();
    assert_eq!(knots.as_slice(), &[0.0, 0.0, 0.25, 0.75, 1.0, 1.0]);
    let expected = dmatrix![1.0, 0.0;
                            0.75, 0.25;
                            0.25, 0.75;
                            0.0, 1.0];
    assert_matrix_eq!(DMatrix::from(&t), expected, comp = abs, tol = 1e-14);
}

#[test]
fn invalid_knots_are_rejected() {
    let knots = linear_segment();
    for knot in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
        assert!(
            matches!(
                knot_insertion_operator(&knots, 1, &[knot]),
                Err(IgaError::InvalidKnot { .. })
            ),
            "knot {knot} should be rejected"
        );
    }

    // Linear functions allow interior knots up to multiplicity 2
    let (repeated, _) = knot_insertion_operator(&knots, 1, &[0.5, 0.5]).unwrap();
    assert_eq!(repeated.multiplicity(0.5), 2);
    assert!(matches!(
        knot_insertion_operator(&knots, 1, &[0.5, 0.5, 0.5]),
        Err(IgaError::InvalidKnot { .. })
    ));
    assert!(matches!(
        knot_insertion_operator(&repeated, 1, &[0.5 + 1e-12]),
        Err(IgaError::InvalidKnot { .. })
    ));
}

#[test]
fn degree_elevation_of_a_line() {
    let (knots, t) = degree_elevation_operator(&linear_segment(), 1, 1).unwrap();
    assert_eq!(knots.as_slice(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    let expected = dmatrix![1.0, 0.0;
                            0.5, 0.5;
                            0.0, 1.0];
    assert_matrix_eq!(DMatrix::from(&t), expected, comp = abs, tol = 1e-12);

    let (same, identity) = degree_elevation_operator(&linear_segment(), 1, 0).unwrap();
    assert_eq!(same, linear_segment());
    assert_matrix_eq!(DMatrix::from(&identity), DMatrix::<f64>::identity(2, 2), comp = abs, tol = 0.0);
}

#[test]
fn degree_elevation_keeps_continuity() {
    let knots = KnotVector::new(vec![0.0, 0.0, 0.5, 1.0, 1.0]).unwrap();
    let (elevated, t) = degree_elevation_operator(&knots, 1, 2).unwrap();
    assert_eq!(elevated.as_slice(), &[0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0]);
    assert_eq!((t.nrows(), t.ncols()), (7, 3));
    // Rows of the operator sum to one, so constants stay constant
    for row in t.row_iter() {
        assert_scalar_eq!(row.values().iter().sum::<f64>(), 1.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn bezier_decomposition_fills_interior_knots() {
    let knots = KnotVector::uniform_open(4, 2).unwrap();
    let (bezier, t) = bezier_decomposition(&knots, 2).unwrap();
    assert_eq!(bezier.as_slice(), &[0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0]);
    assert_eq!((t.nrows(), t.ncols()), (5, 4));

    let (unchanged, _) = bezier_decomposition(&linear_segment(), 1).unwrap();
    assert_eq!(unchanged, linear_segment());
}

#[test]
fn refinement_keeps_rational_fields() {
    let mut arc = create_small_arc(&Point3::origin(), CoordinateAxis::Z, 1.0, 10.0, 100.0).unwrap();
    arc.create_grid_function(
        "TEMPERATURE",
        ControlGrid::structured("TEMPERATURE", vec![3], vec![0.0, 1.0, 4.0]).unwrap(),
    )
    .unwrap();
    let samples = uniform_samples(0.0, 1.0, 13);
    let field = |patch: &fenris_iga::patch::Patch<nalgebra::U1>| -> Vec<f64> {
        let temperature = patch.grid_function::<f64>("TEMPERATURE").unwrap();
        samples.iter().map(|&t| temperature.evaluate(&[t])).collect()
    };
    let before = field(&arc);

    let t = insert_knots_standalone(&mut arc, &[vec![0.3, 0.6]]).unwrap();
    assert_eq!((t.nrows(), t.ncols()), (5, 3));
    for (a, b) in before.iter().zip(field(&arc)) {
        assert_scalar_eq!(*a, b, comp = abs, tol = 1e-12);
    }

    degree_elevate_standalone(&mut arc, &[2]).unwrap();
    assert_eq!(arc.bsplines_space().unwrap().order(0), 4);
    for (a, b) in before.iter().zip(field(&arc)) {
        assert_scalar_eq!(*a, b, comp = abs, tol = 1e-10);
    }
    for &t in &samples {
        let p = arc.evaluate_point(&[t]).unwrap();
        assert_scalar_eq!(p.coords.norm(), 1.0, comp = abs, tol = 1e-10);
    }
}

#[test]
fn knot_insertion_propagates_to_neighbors() {
    let mut multipatch = two_unit_squares();
    let refined = insert_knots(&mut multipatch, 1, &[vec![], vec![0.5]]).unwrap();
    assert_eq!(refined, BTreeSet::from([1, 2]));

    let patch1 = multipatch.patch(1).unwrap();
    let patch2 = multipatch.patch(2).unwrap();
    for patch in [patch1, patch2] {
        let space = patch.bsplines_space().unwrap();
        assert_eq!(space.knot_vector(1).as_slice(), &[0.0, 0.0, 0.5, 1.0, 1.0]);
        assert_eq!(space.numbers(), vec![2, 3]);
    }
    let left = boundary_points(patch1, BoundarySide::U1);
    let right = boundary_points(patch2, BoundarySide::U0);
    assert_eq!(left.len(), 3);
    assert!(max_point_distance(&left, &right) <= 1e-15);
    assert_points_approx_eq!(left[1], Point3::new(1.0, 0.5, 0.0), abstol = 1e-15);
    multipatch.validate().unwrap();
}

#[test]
fn knots_normal_to_the_interface_stay_local() {
    let mut multipatch = two_unit_squares();
    insert_knots(&mut multipatch, 2, &[vec![0.25, 0.5], vec![]]).unwrap();
    assert_eq!(multipatch.patch(2).unwrap().bsplines_space().unwrap().numbers(), vec![4, 2]);
    assert_eq!(multipatch.patch(1).unwrap().bsplines_space().unwrap().numbers(), vec![2, 2]);
    multipatch.validate().unwrap();
}

#[test]
fn knot_insertion_across_a_reversed_interface() {
    let mut multipatch = MultiPatch::new();
    multipatch.add_patch(unit_square(1, 0.0, 0.0)).unwrap();
    // The second parametric direction of patch 2 runs downwards
    let flipped = create_parallelogram(
        &Point3::new(1.0, 1.0, 0.0),
        &Point3::new(2.0, 1.0, 0.0),
        &Point3::new(2.0, 0.0, 0.0),
        &Point3::new(1.0, 0.0, 0.0),
    )
    .unwrap()
    .with_id(2);
    multipatch.add_patch(flipped).unwrap();
    make_interface_2d(&mut multipatch, 1, BoundarySide::U1, 2, BoundarySide::U0, Reversed).unwrap();

    insert_knots(&mut multipatch, 1, &[vec![], vec![0.25]]).unwrap();
    let knots2 = multipatch
        .patch(2)
        .unwrap()
        .bsplines_space()
        .unwrap()
        .knot_vector(1)
        .clone();
    assert_knots_approx_eq!(knots2.as_slice(), [0.0, 0.0, 0.75, 1.0, 1.0], abstol = 1e-14);
    multipatch.validate().unwrap();

    let left = boundary_points(multipatch.patch(1).unwrap(), BoundarySide::U1);
    let mut right = boundary_points(multipatch.patch(2).unwrap(), BoundarySide::U0);
    right.reverse();
    assert!(max_point_distance(&left, &right) <= 1e-14);
}

#[test]
fn each_patch_of_a_cycle_is_refined_once() {
    let mut multipatch = two_by_two_squares();
    let transformations = insert_knots_with_transformations(&mut multipatch, 1, &[vec![], vec![0.5]]).unwrap();
    assert_eq!(transformations.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    multipatch.validate().unwrap();

    let numbers = |id| multipatch.patch(id).unwrap().bsplines_space().unwrap().numbers();
    assert_eq!(numbers(1), vec![2, 3]);
    assert_eq!(numbers(2), vec![2, 3]);
    assert_eq!(numbers(3), vec![2, 2]);
    assert_eq!(numbers(4), vec![2, 2]);

    // Both patches are visited exactly once although each holds an interface to the other
    let mut pair = two_unit_squares();
    let refined = insert_knots(&mut pair, 2, &[vec![], vec![0.3, 0.6]]).unwrap();
    assert_eq!(refined.len(), 2);
    assert_eq!(pair.patch(1).unwrap().bsplines_space().unwrap().number(1), 4);
}

#[test]
fn first_path_to_a_patch_decides_its_knots() {
    // Patch 3 is reached through 2 and 4 first, and neither of these paths carries knots
    // along its first direction
    let mut multipatch = two_by_two_squares();
    let refined = insert_knots(&mut multipatch, 1, &[vec![0.5], vec![]]).unwrap();
    assert_eq!(refined, BTreeSet::from([1, 2, 3, 4]));
    assert_eq!(multipatch.patch(1).unwrap().bsplines_space().unwrap().numbers(), vec![3, 2]);
    assert_eq!(multipatch.patch(3).unwrap().bsplines_space().unwrap().numbers(), vec![2, 2]);
    assert_eq!(
        multipatch.validate(),
        Err(IgaError::NonConformingBoundaries {
            patch1: 1,
            side1: BoundarySide::V1,
            patch2: 3,
            side2: BoundarySide::V0
        })
    );
}

#[test]
fn transformations_map_old_to_new_control_points() {
    let mut multipatch = two_unit_squares();
    let old = multipatch.patch(1).unwrap().control_points().unwrap().clone();
    let transformations = insert_knots_with_transformations(&mut multipatch, 1, &[vec![], vec![0.5]]).unwrap();
    let t = &transformations[&1];
    assert_eq!((t.nrows(), t.ncols()), (6, 4));
    let transformed = old.transform(t, None);
    let new = multipatch.patch(1).unwrap().control_points().unwrap();
    for (a, b) in transformed.values().iter().zip(new.values()) {
        assert!((a.homogeneous() - b.homogeneous()).amax() <= 1e-15);
    }
}

#[test]
fn degree_elevation_propagates_tangential_increments() {
    let mut multipatch = two_unit_squares();
    let transformations = degree_elevate_with_transformations(&mut multipatch, 1, &[1, 2]).unwrap();
    assert_eq!(transformations.len(), 2);
    assert_eq!(multipatch.patch(1).unwrap().bsplines_space().unwrap().orders(), &[2, 3]);
    assert_eq!(multipatch.patch(2).unwrap().bsplines_space().unwrap().orders(), &[1, 3]);
    multipatch.validate().unwrap();

    let left = boundary_points(multipatch.patch(1).unwrap(), BoundarySide::U1);
    let right = boundary_points(multipatch.patch(2).unwrap(), BoundarySide::U0);
    assert!(max_point_distance(&left, &right) <= 1e-12);
}

#[test]
fn refinement_checks_dimensions() {
    let mut multipatch = two_unit_squares();
    assert_eq!(
        insert_knots(&mut multipatch, 1, &[vec![0.5]]),
        Err(IgaError::DimensionMismatch { expected: 2, found: 1 })
    );
    assert_eq!(
        degree_elevate(&mut multipatch, 1, &[1, 1, 1]),
        Err(IgaError::DimensionMismatch { expected: 2, found: 3 })
    );
    assert_eq!(insert_knots(&mut multipatch, 5, &[vec![], vec![]]), Err(IgaError::PatchNotFound(5)));

    // A bad knot on the starting patch fails before anything is replaced
    assert!(insert_knots(&mut multipatch, 1, &[vec![], vec![1.0]]).is_err());
    assert_eq!(multipatch.patch(1).unwrap().total_number(), 4);
    assert_eq!(multipatch.patch(2).unwrap().total_number(), 4);
}

#[test]
fn standalone_refinement_rejects_connected_patches() {
    let multipatch = two_unit_squares();
    let mut copy = multipatch.patch(1).unwrap().clone();
    assert!(matches!(
        insert_knots_standalone(&mut copy, &[vec![0.5], vec![]]),
        Err(IgaError::InvalidArgument(_))
    ));

    let mut single = MultiPatch::new();
    single.add_patch(unit_square(1, 0.0, 0.0)).unwrap();
    let mut owned = single.patch(1).unwrap().clone();
    assert!(matches!(
        degree_elevate_standalone(&mut owned, &[1, 1]),
        Err(IgaError::InvalidArgument(_))
    ));
}

#[test]
fn refinement_across_3d_interfaces_is_unsupported() {
    let mut multipatch = MultiPatch::new();
    let slab1 = create_slab(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 1.0, 1.0)).unwrap();
    let slab2 = create_slab(&Point3::new(1.0, 0.0, 0.0), &Point3::new(2.0, 1.0, 1.0)).unwrap();
    let slab3 = create_slab(&Point3::new(5.0, 0.0, 0.0), &Point3::new(6.0, 1.0, 1.0)).unwrap();
    multipatch.add_patch(slab1.with_id(1)).unwrap();
    multipatch.add_patch(slab2.with_id(2)).unwrap();
    multipatch.add_patch(slab3.with_id(3)).unwrap();
    make_interface_3d(&mut multipatch, 1, BoundarySide::U1, 2, BoundarySide::U0, true, Forward, Forward).unwrap();

    let result = insert_knots(&mut multipatch, 1, &[vec![], vec![0.5], vec![]]);
    assert!(matches!(result, Err(IgaError::Unsupported(_))));
    assert!(matches!(
        degree_elevate(&mut multipatch, 2, &[0, 1, 0]),
        Err(IgaError::Unsupported(_))
    ));
    assert_eq!(multipatch.patch(1).unwrap().total_number(), 8);
    assert_eq!(multipatch.patch(2).unwrap().total_number(), 8);

    // A 3D patch without interfaces refines normally
    let refined = insert_knots(&mut multipatch, 3, &[vec![], vec![0.5], vec![]]).unwrap();
    assert_eq!(refined, BTreeSet::from([3]));
    assert_eq!(multipatch.patch(3).unwrap().total_number(), 12);
}

fn evaluate_on_grid(patch: &fenris_iga::patch::Patch<U2>) -> Vec<Point3<f64>> {
    parametric_grid(&[(0.0, 1.0), (0.0, 1.0)], 6)
        .iter()
        .map(|xi| patch.evaluate_point(xi).unwrap())
        .collect()
}

proptest! {
    #[test]
    fn knot_insertion_preserves_geometry(
        patch in bsplines_patch::<U2>(3, 2),
        knots_u in interior_knots(3),
        knots_v in interior_knots(3),
    ) {
        let before = evaluate_on_grid(&patch);
        let mut refined = patch.clone();
        let t = insert_knots_standalone(&mut refined, &[knots_u.clone(), knots_v.clone()]).unwrap();

        let old_numbers = patch.bsplines_space().unwrap().numbers();
        let new_numbers = refined.bsplines_space().unwrap().numbers();
        prop_assert_eq!(new_numbers[0], old_numbers[0] + knots_u.len());
        prop_assert_eq!(new_numbers[1], old_numbers[1] + knots_v.len());
        prop_assert_eq!((t.nrows(), t.ncols()), (refined.total_number(), patch.total_number()));

        let after = evaluate_on_grid(&refined);
        prop_assert!(max_point_distance(&before, &after) <= 1e-9);
    }

    #[test]
    fn degree_elevation_preserves_geometry(
        patch in bsplines_patch::<U2>(3, 2),
        increments in [0usize..=2, 0usize..=2],
    ) {
        let before = evaluate_on_grid(&patch);
        let mut elevated = patch.clone();
        degree_elevate_standalone(&mut elevated, &increments).unwrap();

        let old_orders = patch.bsplines_space().unwrap().orders().to_vec();
        let new_orders = elevated.bsplines_space().unwrap().orders().to_vec();
        prop_assert_eq!(new_orders, vec![old_orders[0] + increments[0], old_orders[1] + increments[1]]);

        let after = evaluate_on_grid(&elevated);
        prop_assert!(max_point_distance(&before, &after) <= 1e-7);
    }
}
