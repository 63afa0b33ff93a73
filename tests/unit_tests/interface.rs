use fenris_iga::interface::PatchInterface;
use fenris_iga::space::BoundaryDirection::{Forward, Reversed};
use fenris_iga::space::BoundarySide;

#[test]
fn mirror_of_2d_interface() {
    let interface = PatchInterface::new_2d(1, BoundarySide::U1, 2, BoundarySide::V0, Reversed);
    let mirror = interface.mirror();
    assert_eq!(mirror.patch1(), 2);
    assert_eq!(mirror.side1(), BoundarySide::V0);
    assert_eq!(mirror.patch2(), 1);
    assert_eq!(mirror.side2(), BoundarySide::U1);
    assert_eq!(mirror.directions(), &[Reversed]);
    assert!(mirror.is_mirror_of(&interface));
    assert_eq!(mirror.mirror(), interface);
    assert_eq!(interface.patch_dim(), 2);
}

#[test]
fn mirror_of_3d_interface_inverts_the_axis_map() {
    let interface = PatchInterface::new_3d(1, BoundarySide::W1, 2, BoundarySide::U0, false, Forward, Reversed);
    assert_eq!(interface.local_parameter_map(), &[1, 0]);
    assert_eq!(interface.patch_dim(), 3);

    let mirror = interface.mirror();
    assert_eq!(mirror.local_parameter_map(), &[1, 0]);
    assert_eq!(mirror.directions(), &[Reversed, Forward]);
    assert_eq!(mirror.mirror(), interface);

    let aligned = PatchInterface::new_3d(1, BoundarySide::W1, 2, BoundarySide::W0, true, Reversed, Forward);
    assert_eq!(aligned.mirror().directions(), &[Reversed, Forward]);
    assert_eq!(aligned.mirror().local_parameter_map(), &[0, 1]);
}

#[test]
fn transport_axis_follows_the_shared_boundary() {
    let interface = PatchInterface::new_2d(1, BoundarySide::U1, 2, BoundarySide::U0, Forward);
    assert_eq!(interface.transport_axis(1), Some((1, Forward)));
    assert_eq!(interface.transport_axis(0), None);

    let interface = PatchInterface::new_2d(1, BoundarySide::V1, 2, BoundarySide::U0, Reversed);
    assert_eq!(interface.transport_axis(0), Some((1, Reversed)));
    assert_eq!(interface.transport_axis(1), None);

    // Boundary axes of W1 are (0, 1), those of U0 are (1, 2); the map swaps them
    let interface = PatchInterface::new_3d(1, BoundarySide::W1, 2, BoundarySide::U0, false, Forward, Reversed);
    assert_eq!(interface.transport_axis(0), Some((2, Forward)));
    assert_eq!(interface.transport_axis(1), Some((1, Reversed)));
    assert_eq!(interface.transport_axis(2), None);
}

#[test]
fn flipping_sides() {
    let mut interface = PatchInterface::new_2d(1, BoundarySide::U1, 2, BoundarySide::U0, Forward);
    interface.flip_side1();
    assert_eq!(interface.side1(), BoundarySide::U0);
    interface.flip_side2();
    assert_eq!(interface.side2(), BoundarySide::U1);
}

#[test]
fn interface_round_trips_through_json() {
    let interface = PatchInterface::new_3d(4, BoundarySide::V0, 9, BoundarySide::W1, false, Reversed, Forward);
    let json = serde_json::to_string(&interface).unwrap();
    assert!(json.contains("\"V0\""));
    let deserialized: PatchInterface = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, interface);
}
