use crate::{evaluate, try_evaluate, PackedBatch};
use nalgebra::{Matrix2x3, U2, U3};
use qkernels::error::{KernelError, LayoutError};
use qkernels::layout::{packed_index, FieldSpec, PackedInputs, PackedOutputs, PointInput, PointOutput};
use qkernels::pointwise::{PointLoop, PointwiseKernel};

/// Copies a 2x3 matrix field and a scalar through the packed accessors.
struct Passthrough;

impl PointwiseKernel<f64> for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn input_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("a", 1), FieldSpec::new("m", 6)]
    }

    fn output_fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::new("m_out", 6), FieldSpec::new("a_out", 1)]
    }

    fn evaluate_point(&self, input: &PointInput<f64>, output: &mut PointOutput<f64>) -> Result<(), KernelError> {
        let m = input.matrix::<U2, U3>(1);
        output.set_matrix(0, &m);
        output.set(1, 0, input.scalar(0));
        Ok(())
    }
}

#[test]
fn packed_index_is_component_major_point_minor() {
    assert_eq!(packed_index(0, 4, 0, 0), 0);
    assert_eq!(packed_index(0, 4, 3, 0), 3);
    assert_eq!(packed_index(0, 4, 1, 2), 9);
    assert_eq!(packed_index(10, 4, 1, 2), 19);
}

#[test]
fn point_input_reads_fields_at_their_offsets() {
    // Two points, field "s" (1 component) at offset 0 and field "v" (2 components) at offset 2
    let fields = [FieldSpec::new("s", 1), FieldSpec::new("v", 2)];
    let offsets = [0, 2];
    let data = [1.0, 2.0, 10.0, 20.0, 11.0, 21.0];
    let inputs = PackedInputs::new(&data, &offsets, &fields, 2).unwrap();

    let p0 = inputs.at_point(0);
    let p1 = inputs.at_point(1);
    assert_eq!(p0.scalar(0), 1.0);
    assert_eq!(p1.scalar(0), 2.0);
    assert_eq!(p0.get(1, 0), 10.0);
    assert_eq!(p0.get(1, 1), 11.0);
    assert_eq!(p1.get(1, 0), 20.0);
    assert_eq!(p1.get(1, 1), 21.0);
    assert_eq!(p1.vector::<U2>(1).as_slice(), &[20.0, 21.0]);
    assert_eq!(p1.point_index(), 1);
    assert_eq!(p1.num_components(1), 2);
}

#[test]
fn matrix_fields_are_read_column_major() {
    let fields = [FieldSpec::new("m", 6)];
    let data: Vec<f64> = (0..6).map(|c| c as f64).collect();
    let inputs = PackedInputs::new(&data, &[0], &fields, 1).unwrap();
    let m = inputs.at_point(0).matrix::<U2, U3>(0);
    #[rustfmt::skip]
    let expected = Matrix2x3::new(
        0.0, 2.0, 4.0,
        1.0, 3.0, 5.0);
    assert_eq!(m, expected);
}

#[test]
fn outputs_are_written_to_their_own_slots() {
    let num_points = 5;
    let mut inputs = PackedBatch::inputs_for(&Passthrough, num_points);
    for i in 0..num_points {
        inputs.set(0, i, 0, 100.0 + i as f64);
        let values: Vec<f64> = (0..6).map(|c| (10 * i + c) as f64).collect();
        inputs.set_point(1, i, &values);
    }

    let outputs = evaluate(&Passthrough, &inputs);
    for i in 0..num_points {
        assert_eq!(outputs.point_values(0, i), inputs.point_values(1, i));
        assert_eq!(outputs.get(1, i, 0), 100.0 + i as f64);
    }
}

#[test]
fn inputs_reject_offset_count_mismatch() {
    let fields = [FieldSpec::new("a", 1), FieldSpec::new("b", 1)];
    let data = [0.0; 4];
    let err = PackedInputs::new(&data, &[0], &fields, 2).unwrap_err();
    assert_eq!(err, LayoutError::OffsetCount { expected: 2, actual: 1 });
}

#[test]
fn inputs_reject_fields_past_the_end_of_the_buffer() {
    let fields = [FieldSpec::new("a", 2)];
    let data = [0.0; 5];
    let err = PackedInputs::new(&data, &[0], &fields, 3).unwrap_err();
    assert_eq!(
        err,
        LayoutError::FieldOutOfBounds {
            field: "a",
            end: Some(6),
            len: 5
        }
    );

    let err = PackedInputs::new(&data, &[usize::MAX], &fields, 3).unwrap_err();
    assert_eq!(
        err,
        LayoutError::FieldOutOfBounds {
            field: "a",
            end: None,
            len: 5
        }
    );
}

#[test]
fn inputs_may_alias() {
    let fields = [FieldSpec::new("a", 2), FieldSpec::new("b", 2)];
    let data = [1.0, 2.0, 3.0, 4.0];
    let inputs = PackedInputs::new(&data, &[0, 0], &fields, 2).unwrap();
    assert_eq!(inputs.at_point(1).get(0, 1), inputs.at_point(1).get(1, 1));
}

#[test]
fn outputs_reject_overlapping_fields() {
    let fields = [FieldSpec::new("a", 2), FieldSpec::new("b", 1)];
    let mut data = [0.0; 8];
    let result = PackedOutputs::new(&mut data, &[0, 3], &fields, 2);
    assert!(matches!(
        result,
        Err(LayoutError::OverlappingFields {
            first: "a",
            second: "b"
        })
    ));

    // Touching but disjoint ranges are fine
    let result = PackedOutputs::new(&mut data, &[0, 4], &fields, 2);
    assert!(result.is_ok());
}

#[test]
fn empty_batches_are_accepted() {
    let inputs = PackedBatch::inputs_for(&Passthrough, 0);
    let outputs = evaluate(&Passthrough, &inputs);
    assert!(outputs.data.is_empty());
}

#[test]
fn kernel_apply_reports_layout_errors_before_evaluating() {
    let inputs = PackedBatch::inputs_for(&Passthrough, 3);
    let mut output = vec![f64::NAN; 21];
    // The second output offset is missing
    let result = Passthrough.apply(
        &PointLoop::default(),
        3,
        &inputs.offsets,
        &[0],
        &inputs.data,
        &mut output,
    );
    assert_eq!(
        result,
        Err(KernelError::Layout(LayoutError::OffsetCount { expected: 2, actual: 1 }))
    );
    assert!(output.iter().all(|x| x.is_nan()));

    // Input buffer one entry too short
    let mut inputs_short = inputs.clone();
    inputs_short.data.pop();
    let err = try_evaluate(&Passthrough, &inputs_short, &PointLoop::sequential()).unwrap_err();
    assert!(matches!(err, KernelError::Layout(LayoutError::FieldOutOfBounds { field: "m", .. })));
}

#[test]
#[should_panic]
fn writing_past_the_declared_components_panics() {
    struct Overflowing;

    impl PointwiseKernel<f64> for Overflowing {
        fn name(&self) -> &'static str {
            "overflowing"
        }

        fn input_fields(&self) -> Vec<FieldSpec> {
            vec![]
        }

        fn output_fields(&self) -> Vec<FieldSpec> {
            vec![FieldSpec::new("a", 1), FieldSpec::new("b", 1)]
        }

        fn evaluate_point(&self, _: &PointInput<f64>, output: &mut PointOutput<f64>) -> Result<(), KernelError> {
            output.set(0, 1, 1.0);
            Ok(())
        }
    }

    let inputs = PackedBatch::inputs_for(&Overflowing, 1);
    let _ = try_evaluate(&Overflowing, &inputs, &PointLoop::sequential());
}
