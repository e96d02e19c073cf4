//! Curve policy loading from TOML files
//!
//! The player embeds [`CurvePolicy`] in its own config file; these tests pin
//! the table layout users write.

use beatmix_common::config::load_toml;
use beatmix_common::{CurvePair, CurvePolicy, FadeCurve, FadeType};
use serde::Deserialize;
use std::io::Write;

#[derive(Debug, Deserialize)]
struct Wrapper {
    fade_curves: CurvePolicy,
}

fn load(text: &str) -> Wrapper {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", text).unwrap();
    load_toml(file.path()).unwrap()
}

#[test]
fn test_per_type_tables() {
    let wrapper = load(
        r#"
[fade_curves.default]
fade_in = "linear"
fade_out = "linear"

[fade_curves.double_drop]
fade_in = "exponential"
fade_out = "logarithmic"
"#,
    );
    let policy = wrapper.fade_curves;

    assert_eq!(
        policy.curves_for(FadeType::DoubleDrop),
        CurvePair {
            fade_in: FadeCurve::Exponential,
            fade_out: FadeCurve::Logarithmic,
        }
    );
    // Not listed: falls back to the default pair
    assert_eq!(policy.curves_for(FadeType::Chill), CurvePair::matched(FadeCurve::Linear));
}

#[test]
fn test_missing_default_uses_linear() {
    let wrapper = load(
        r#"
[fade_curves.rolling]
fade_in = "s_curve"
fade_out = "s_curve"
"#,
    );

    assert_eq!(wrapper.fade_curves.default, CurvePair::default());
    assert_eq!(
        wrapper.fade_curves.curves_for(FadeType::Rolling),
        CurvePair::matched(FadeCurve::SCurve)
    );
}

#[test]
fn test_unknown_curve_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "[fade_curves.chill]\nfade_in = \"wobbly\"\nfade_out = \"linear\"\n"
    )
    .unwrap();

    let result: beatmix_common::Result<Wrapper> = load_toml(file.path());
    assert!(result.is_err());
}
