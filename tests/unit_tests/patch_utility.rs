use crate::{boundary_points, two_unit_squares, unit_square};
use fenris_iga::error::IgaError;
use fenris_iga::multipatch::MultiPatch;
use fenris_iga::patch_utility::{
    create_loft_patch, create_loft_patch_from_pair, make_interface_2d, reverse, reverse_patch,
};
use fenris_iga::procedural::{create_line, create_rectangle};
use fenris_iga::proptest::bsplines_patch;
use fenris_iga::refinement::insert_knots_standalone;
use fenris_iga::space::BoundaryDirection::Forward;
use fenris_iga::space::BoundarySide;
use nalgebra::{Point3, U2};
use proptest::prelude::*;
use std::collections::BTreeSet;
use util::{assert_knots_approx_eq, assert_points_approx_eq};

#[test]
fn interfaces_require_conforming_boundaries() {
    let mut multipatch = MultiPatch::new();
    multipatch.add_patch(unit_square(1, 0.0, 0.0)).unwrap();
    let mut refined = unit_square(2, 1.0, 0.0);
    insert_knots_standalone(&mut refined, &[vec![], vec![0.5]]).unwrap();
    multipatch.add_patch(refined).unwrap();

    let result = make_interface_2d(&mut multipatch, 1, BoundarySide::U1, 2, BoundarySide::U0, Forward);
    assert_eq!(
        result,
        Err(IgaError::NonConformingBoundaries {
            patch1: 1,
            side1: BoundarySide::U1,
            patch2: 2,
            side2: BoundarySide::U0
        })
    );
    assert_eq!(multipatch.patch(1).unwrap().number_of_interfaces(), 0);
    assert_eq!(multipatch.patch(2).unwrap().number_of_interfaces(), 0);

    // Knots along x do not touch the shared edge
    let mut multipatch = MultiPatch::new();
    multipatch.add_patch(unit_square(1, 0.0, 0.0)).unwrap();
    let mut refined = unit_square(2, 1.0, 0.0);
    insert_knots_standalone(&mut refined, &[vec![0.5], vec![]]).unwrap();
    multipatch.add_patch(refined).unwrap();
    make_interface_2d(&mut multipatch, 1, BoundarySide::U1, 2, BoundarySide::U0, Forward).unwrap();
    multipatch.validate().unwrap();
}

#[test]
fn repeated_interface_is_ignored() {
    let mut multipatch = two_unit_squares();
    make_interface_2d(&mut multipatch, 1, BoundarySide::U1, 2, BoundarySide::U0, Forward).unwrap();
    assert_eq!(multipatch.patch(1).unwrap().number_of_interfaces(), 1);
    assert_eq!(multipatch.patch(2).unwrap().number_of_interfaces(), 1);

    assert_eq!(
        make_interface_2d(&mut multipatch, 1, BoundarySide::V1, 5, BoundarySide::V0, Forward),
        Err(IgaError::PatchNotFound(5))
    );
}

#[test]
fn loft_stacks_control_points_in_input_order() {
    let a = create_line(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 0.0, 0.0), 2).unwrap();
    let b = create_line(&Point3::new(0.0, 1.0, 0.0), &Point3::new(1.0, 1.0, 0.0), 2).unwrap();
    let loft = create_loft_patch_from_pair(&a, &b).unwrap();
    assert_eq!(loft.id(), 0);

    let space = loft.bsplines_space().unwrap();
    assert_eq!(space.orders(), &[2, 1]);
    assert_eq!(space.numbers(), vec![3, 2]);
    assert_eq!(space.knot_vector(1).as_slice(), &[0.0, 0.0, 1.0, 1.0]);

    let points = loft.control_points().unwrap().points();
    assert_eq!(points.len(), 6);
    assert_eq!(&points[..3], a.control_points().unwrap().points().as_slice());
    assert_eq!(&points[3..], b.control_points().unwrap().points().as_slice());
}

#[test]
fn loft_errors() {
    let a = create_line(&Point3::new(0.0, 0.0, 0.0), &Point3::new(1.0, 0.0, 0.0), 2).unwrap();
    let b = create_line(&Point3::new(0.0, 1.0, 0.0), &Point3::new(1.0, 1.0, 0.0), 1)
        .unwrap()
        .with_id(4);

    let empty: [&fenris_iga::patch::Patch<nalgebra::U1>; 0] = [];
    assert!(matches!(create_loft_patch(&empty, 1), Err(IgaError::InvalidArgument(_))));
    assert_eq!(
        create_loft_patch(&[&a, &b], 1).unwrap_err(),
        IgaError::IncompatiblePatches { reference: 0, patch: 4 }
    );
    // Two layers cannot carry quadratic functions
    assert!(matches!(
        create_loft_patch(&[&a, &a], 2),
        Err(IgaError::InvalidOrder { .. })
    ));
    let quadratic = create_loft_patch(&[&a, &a, &a], 2).unwrap();
    assert_eq!(quadratic.bsplines_space().unwrap().numbers(), vec![3, 3]);
}

#[test]
fn connected_patches_cannot_be_reversed_alone() {
    let multipatch = two_unit_squares();
    let mut patch = multipatch.patch(1).unwrap().clone();
    assert!(matches!(reverse_patch(&mut patch, 0), Err(IgaError::InvalidArgument(_))));

    let mut square = unit_square(1, 0.0, 0.0);
    assert!(matches!(reverse_patch(&mut square, 2), Err(IgaError::InvalidArgument(_))));
}

#[test]
fn reversing_normal_to_an_interface_moves_the_interface() {
    let mut multipatch = two_unit_squares();
    let reversed = reverse(&mut multipatch, 1, 0).unwrap();
    assert_eq!(reversed, BTreeSet::from([1]));

    let patch1 = multipatch.patch(1).unwrap();
    let patch2 = multipatch.patch(2).unwrap();
    assert_eq!(patch1.interface(0).unwrap().side1(), BoundarySide::U0);
    assert_eq!(patch2.interface(0).unwrap().side2(), BoundarySide::U0);
    assert!(patch2.interface(0).unwrap().is_mirror_of(patch1.interface(0).unwrap()));
    assert_eq!(
        boundary_points(patch1, BoundarySide::U0),
        boundary_points(patch2, BoundarySide::U0)
    );
    multipatch.validate().unwrap();
}

#[test]
fn reversing_along_an_interface_reverses_the_neighbor() {
    let mut multipatch = two_unit_squares();
    multipatch.enumerate().unwrap();
    let reversed = reverse(&mut multipatch, 1, 1).unwrap();
    assert_eq!(reversed, BTreeSet::from([1, 2]));
    assert!(!multipatch.is_enumerated());

    let patch1 = multipatch.patch(1).unwrap();
    let patch2 = multipatch.patch(2).unwrap();
    let left = boundary_points(patch1, BoundarySide::U1);
    assert_eq!(left, boundary_points(patch2, BoundarySide::U0));
    assert_eq!(left[0], Point3::new(1.0, 1.0, 0.0));
    multipatch.validate().unwrap();
    assert_eq!(multipatch.enumerate().unwrap(), 6);
}

#[test]
fn reversing_a_loop_of_three_patches_keeps_interfaces_mirrored() {
    use BoundarySide::{U0, U1, V0, V1};
    let mut multipatch = MultiPatch::new();
    multipatch.add_patch(unit_square(1, 0.0, 0.0)).unwrap();
    multipatch.add_patch(unit_square(2, 0.0, 1.0)).unwrap();
    multipatch.add_patch(unit_square(3, 1.0, 0.0)).unwrap();
    make_interface_2d(&mut multipatch, 1, V1, 2, V0, Forward).unwrap();
    make_interface_2d(&mut multipatch, 2, V1, 3, V0, Forward).unwrap();
    make_interface_2d(&mut multipatch, 1, U1, 3, U0, Forward).unwrap();

    // Patch 3 is reached through patch 2 before patch 1 handles its own interface to patch 3
    let reversed = reverse(&mut multipatch, 1, 0).unwrap();
    assert_eq!(reversed, BTreeSet::from([1, 2, 3]));

    let patch1 = multipatch.patch(1).unwrap();
    let patch3 = multipatch.patch(3).unwrap();
    let interface = patch1.interface(1).unwrap();
    assert_eq!((interface.side1(), interface.patch2(), interface.side2()), (U0, 3, U1));
    let mirror = patch3.interface(1).unwrap();
    assert_eq!((mirror.side1(), mirror.patch2(), mirror.side2()), (U1, 1, U0));
    assert!(mirror.is_mirror_of(interface));
    assert_eq!(patch1.find_boundary_side(3), Some(U0));
    assert_eq!(patch3.find_boundary_side(1), Some(U1));
    multipatch.validate().unwrap();
}

#[test]
fn reversing_a_nonuniform_rectangle() {
    let mut patch = create_rectangle(&Point3::new(0.0, 0.0, 0.0), &Point3::new(3.0, 1.0, 0.0)).unwrap();
    insert_knots_standalone(&mut patch, &[vec![0.2], vec![]]).unwrap();
    reverse_patch(&mut patch, 0).unwrap();
    assert_knots_approx_eq!(
        patch.bsplines_space().unwrap().knot_vector(0).as_slice(),
        [0.0, 0.0, 0.8, 1.0, 1.0],
        abstol = 1e-14
    );
    let p = patch.evaluate_point(&[0.0, 0.0]).unwrap();
    assert_points_approx_eq!(p, Point3::new(3.0, 0.0, 0.0), abstol = 1e-14);
}

proptest! {
    #[test]
    fn reversing_twice_restores_the_patch(patch in bsplines_patch::<U2>(3, 2), axis in 0..2usize) {
        let mut reversed = patch.clone();
        reverse_patch(&mut reversed, axis).unwrap();
        reverse_patch(&mut reversed, axis).unwrap();

        let original_space = patch.bsplines_space().unwrap();
        let space = reversed.bsplines_space().unwrap();
        prop_assert_eq!(space.orders(), original_space.orders());
        for d in 0..2 {
            assert_knots_approx_eq!(
                space.knot_vector(d).as_slice(),
                original_space.knot_vector(d).as_slice(),
                abstol = 1e-12
            );
        }
        prop_assert_eq!(reversed.control_points().unwrap(), patch.control_points().unwrap());
    }
}
