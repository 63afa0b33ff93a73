use fenris_iga::control::ControlGrid;
use fenris_iga::grid_function::{ControlGridData, GridFunction, GridValue, CONTROL_POINT};
use fenris_iga::procedural::{create_line, create_small_arc, CoordinateAxis};
use fenris_iga::space::{BSplinesFESpace, FunctionSpace};
use matrixcompare::assert_scalar_eq;
use nalgebra::{DVector, Point3, Vector3, U1};
use util::{assert_points_approx_eq, uniform_samples};

fn quarter_circle() -> fenris_iga::patch::Patch<U1> {
    create_small_arc(&Point3::origin(), CoordinateAxis::Z, 2.0, 0.0, 90.0).unwrap()
}

#[test]
fn line_evaluates_linearly() {
    let line = create_line(&Point3::new(0.0, 0.0, 0.0), &Point3::new(2.0, 0.0, 0.0), 3).unwrap();
    for t in uniform_samples(0.0, 1.0, 7) {
        let expected = Point3::new(2.0 * t, 0.0, 0.0);
        assert_points_approx_eq!(line.evaluate_point(&[t]).unwrap(), expected, abstol = 1e-14);
    }
}

#[test]
fn rational_arc_lies_on_circle() {
    let arc = quarter_circle();
    assert_points_approx_eq!(arc.evaluate_point(&[0.0]).unwrap(), Point3::new(2.0, 0.0, 0.0), abstol = 1e-14);
    assert_points_approx_eq!(arc.evaluate_point(&[1.0]).unwrap(), Point3::new(0.0, 2.0, 0.0), abstol = 1e-14);
    for t in uniform_samples(0.0, 1.0, 11) {
        let p = arc.evaluate_point(&[t]).unwrap();
        assert_scalar_eq!(p.coords.norm(), 2.0, comp = abs, tol = 1e-13);
        assert_scalar_eq!(p.z, 0.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn fields_are_weighted_by_control_point_weights() {
    let mut arc = quarter_circle();
    arc.create_grid_function("TEMPERATURE", ControlGrid::filled("TEMPERATURE", vec![3], 5.0))
        .unwrap();
    let temperature = arc.grid_function::<f64>("TEMPERATURE").unwrap();
    assert!(temperature.weights().is_some());
    for t in uniform_samples(0.0, 1.0, 9) {
        assert_scalar_eq!(temperature.evaluate(&[t]), 5.0, comp = abs, tol = 1e-14);
        let sum: f64 = temperature.basis_values(&[t]).iter().map(|(_, r)| r).sum();
        assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-14);
    }

    let control_points = arc.grid_function::<fenris_iga::control::ControlPoint>(CONTROL_POINT).unwrap();
    assert!(control_points.weights().is_none());
}

#[test]
fn rational_gradient_matches_finite_differences() {
    let mut arc = quarter_circle();
    arc.create_grid_function(
        "TEMPERATURE",
        ControlGrid::structured("TEMPERATURE", vec![3], vec![0.0, 1.0, 4.0]).unwrap(),
    )
    .unwrap();
    let temperature = arc.grid_function::<f64>("TEMPERATURE").unwrap();
    let h = 1e-6;
    for t in [0.1, 0.3, 0.5, 0.8] {
        let fd = (temperature.evaluate(&[t + h]) - temperature.evaluate(&[t - h])) / (2.0 * h);
        assert_scalar_eq!(temperature.gradient(&[t])[0], fd, comp = abs, tol = 1e-6);
    }
}

#[test]
fn unweighted_vector_field() {
    let space = BSplinesFESpace::<U1>::primitive(&[1]).unwrap();
    let velocities = vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(3.0, 2.0, 0.0)];
    let grid = ControlGrid::structured("VELOCITY", vec![2], velocities).unwrap();
    let field = GridFunction::new(&space as &dyn FunctionSpace<U1>, &grid);
    assert_eq!(field.evaluate(&[0.5]), Vector3::new(2.0, 1.0, 0.0));
    assert_eq!(field.gradient(&[0.5]), vec![Vector3::new(2.0, 2.0, 0.0)]);
}

#[test]
fn grid_data_reports_value_types() {
    let mut line = create_line(&Point3::origin(), &Point3::new(1.0, 0.0, 0.0), 1).unwrap();
    line.create_grid_function("VELOCITY", ControlGrid::filled("VELOCITY", vec![2], Vector3::zeros()))
        .unwrap();
    line.create_grid_function("DATA", ControlGrid::unstructured("DATA", vec![DVector::zeros(4); 2]))
        .unwrap();

    let names: Vec<&str> = line.grid_function_names().collect();
    assert_eq!(names, vec![CONTROL_POINT, "DATA", "VELOCITY"]);

    let types: Vec<&str> = line.grid_data().map(ControlGridData::type_name).collect();
    assert_eq!(types, vec!["control point", "vector", "array_1d<double, 3>"]);
    assert_eq!(<Vector3<f64> as GridValue>::TYPE_NAME, "array_1d<double, 3>");

    let structured: Vec<bool> = line.grid_data().map(ControlGridData::is_structured).collect();
    assert_eq!(structured, vec![true, false, true]);

    assert!(line.has_grid_function::<Vector3<f64>>("VELOCITY"));
    assert!(!line.has_grid_function::<f64>("VELOCITY"));
}
