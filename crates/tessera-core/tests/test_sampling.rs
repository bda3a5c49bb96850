use tessera_core::consts::MAX_SAMPLE_SIZE;
use tessera_core::sampling::calculate_in_sample_size;

#[test]
fn test_no_reduction_at_or_above_full_scale() {
    for scale in [1.0, 1.5, 3.0, 10.0] {
        assert_eq!(calculate_in_sample_size(6000, 4000, scale, 1.0), 1);
    }
}

#[test]
fn test_results_are_powers_of_two() {
    let mut scale = 1.0f32;
    while scale > 0.0005 {
        let ss = calculate_in_sample_size(6000, 4000, scale, 1.0);
        assert!(ss.is_power_of_two(), "scale {scale} gave {ss}");
        assert!(ss <= MAX_SAMPLE_SIZE);
        scale *= 0.93;
    }
}

#[test]
fn test_monotonic_as_scale_decreases() {
    let mut previous = 1;
    let mut scale = 2.0f32;
    while scale > 0.0001 {
        let ss = calculate_in_sample_size(10000, 8000, scale, 1.0);
        assert!(ss >= previous, "scale {scale}: {ss} < {previous}");
        previous = ss;
        scale *= 0.9;
    }
    assert_eq!(previous, MAX_SAMPLE_SIZE);
}

#[test]
fn test_known_thresholds() {
    // Ratio 2 rounds to 2, and the largest power strictly below 2 is 1.
    assert_eq!(calculate_in_sample_size(4000, 4000, 0.5, 1.0), 1);
    // Ratio 4: 2.
    assert_eq!(calculate_in_sample_size(4000, 4000, 0.25, 1.0), 2);
    // Ratio 10: 8.
    assert_eq!(calculate_in_sample_size(4000, 4000, 0.1, 1.0), 8);
}

#[test]
fn test_zero_requested_dimension_hits_cap() {
    assert_eq!(calculate_in_sample_size(10, 10_000, 0.05, 1.0), MAX_SAMPLE_SIZE);
    assert_eq!(calculate_in_sample_size(100, 100, 0.0, 1.0), MAX_SAMPLE_SIZE);
}

#[test]
fn test_dpi_factor_scales_request() {
    assert_eq!(
        calculate_in_sample_size(4000, 4000, 0.2, 0.5),
        calculate_in_sample_size(4000, 4000, 0.1, 1.0)
    );
}
