//! Turns raw attribution vectors into the ranked, normalized payload the
//! dashboard renders.

use xai_models::{
    Explanation, FeatureContribution, NormalizedImportance, PredictionKind, RawContribution,
    Result, XaiError,
};
use crate::narrative;
use crate::shap::Explainer;

pub const DEFAULT_TOP_K: usize = 5;

/// Pairs attributions with their feature names and keeps the `k` largest by
/// absolute value. Ties keep the original feature order.
pub fn rank_attributions(values: &[f64], names: &[String], k: usize) -> Result<Vec<RawContribution>> {
    if values.len() != names.len() {
        return Err(XaiError::AttributionShape {
            expected: names.len(),
            actual: values.len(),
        });
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(XaiError::NonFiniteAttribution {
            feature: names[i].clone(),
        });
    }

    let mut order: Vec<usize> = (0..values.len()).collect();
    // sort_by is stable, so equal magnitudes stay in feature order
    order.sort_by(|&a, &b| values[b].abs().total_cmp(&values[a].abs()));
    order.truncate(k);

    Ok(order
        .into_iter()
        .map(|i| RawContribution {
            feature: names[i].clone(),
            shap_value: values[i],
        })
        .collect())
}

/// Rescales so the absolute contributions sum to 1, keeping signs. An
/// all-zero selection stays zero.
pub fn normalize(ranked: &[RawContribution]) -> NormalizedImportance {
    let total: f64 = ranked.iter().map(|c| c.shap_value.abs()).sum();
    NormalizedImportance(
        ranked
            .iter()
            .map(|c| FeatureContribution {
                feature: c.feature.clone(),
                contribution: if total > 0.0 { c.shap_value / total } else { 0.0 },
            })
            .collect(),
    )
}

/// Top-`k` features by absolute attribution, normalized.
pub fn top_features(values: &[f64], names: &[String], k: usize) -> Result<NormalizedImportance> {
    rank_attributions(values, names, k).map(|ranked| normalize(&ranked))
}

/// `injuries_last_season` -> `Injuries Last Season`.
pub fn title_case(feature: &str) -> String {
    feature
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn key_factor(contribution: &RawContribution) -> String {
    let title = title_case(&contribution.feature);
    let value = contribution.shap_value;
    if value > 0.0 {
        format!("{title} increased the prediction by {:.3}", value.abs())
    } else if value < 0.0 {
        format!("{title} decreased the prediction by {:.3}", value.abs())
    } else {
        format!("{title} did not change the prediction")
    }
}

/// Runs `explainer` on one feature row and shapes the full payload.
pub fn explain(
    kind: PredictionKind,
    explainer: &dyn Explainer,
    row: &[f64],
    names: &[String],
    k: usize,
) -> Result<Explanation> {
    let attribution = explainer.attributions(row)?;
    let ranked = rank_attributions(&attribution.values, names, k)?;
    let top_features = normalize(&ranked);
    let narrative = narrative::narrative(kind, &top_features);

    Ok(Explanation {
        available: true,
        method: Some(explainer.method()),
        base_value: attribution.base_value,
        key_factors: ranked.iter().map(key_factor).collect(),
        top_features,
        shap_values: ranked,
        narrative: Some(narrative),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shap::Attribution;
    use proptest::prelude::*;
    use xai_models::ExplanationMethod;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_ranking_and_normalization() {
        let names = vec!["goals".to_string(), "age".to_string(), "tackles".to_string()];
        let top = top_features(&[0.3, -0.6, 0.1], &names, 2).unwrap();

        assert_eq!(top.len(), 2);
        assert_eq!(top.0[0].feature, "age");
        assert!((top.0[0].contribution + 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(top.0[1].feature, "goals");
        assert!((top.0[1].contribution - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ties_keep_feature_order() {
        let ranked = rank_attributions(&[0.2, -0.5, 0.5, 0.2], &names(4), 4).unwrap();
        let order: Vec<&str> = ranked.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(order, ["f1", "f2", "f0", "f3"]);
    }

    #[test]
    fn test_k_bounds() {
        assert!(top_features(&[1.0, 2.0], &names(2), 0).unwrap().is_empty());
        assert_eq!(top_features(&[1.0, 2.0], &names(2), 10).unwrap().len(), 2);
    }

    #[test]
    fn test_all_zero_stays_zero() {
        let top = top_features(&[0.0, 0.0, 0.0], &names(3), 2).unwrap();
        assert_eq!(top.len(), 2);
        assert!(top.iter().all(|c| c.contribution == 0.0));
    }

    #[test]
    fn test_invalid_attributions() {
        assert!(matches!(
            top_features(&[1.0], &names(2), 5),
            Err(XaiError::AttributionShape { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            top_features(&[1.0, f64::NAN], &names(2), 5),
            Err(XaiError::NonFiniteAttribution { feature }) if feature == "f1"
        ));
    }

    #[test]
    fn test_key_factor_sentences() {
        let up = RawContribution { feature: "goals_per_match".to_string(), shap_value: 0.12345 };
        let down = RawContribution { feature: "age".to_string(), shap_value: -2.5 };
        let none = RawContribution { feature: "is_starter".to_string(), shap_value: 0.0 };

        assert_eq!(key_factor(&up), "Goals Per Match increased the prediction by 0.123");
        assert_eq!(key_factor(&down), "Age decreased the prediction by 2.500");
        assert_eq!(key_factor(&none), "Is Starter did not change the prediction");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("injuries_last_season"), "Injuries Last Season");
        assert_eq!(title_case("team_a_goals"), "Team A Goals");
        assert_eq!(title_case("age"), "Age");
    }

    struct FixedExplainer(Vec<f64>);

    impl Explainer for FixedExplainer {
        fn method(&self) -> ExplanationMethod {
            ExplanationMethod::TreeShap
        }

        fn attributions(&self, _row: &[f64]) -> Result<Attribution> {
            Ok(Attribution { values: self.0.clone(), base_value: Some(70.0) })
        }
    }

    #[test]
    fn test_explain_payload() {
        let names = vec![
            "goals".to_string(),
            "age".to_string(),
            "tackles".to_string(),
            "passes".to_string(),
        ];
        let explainer = FixedExplainer(vec![4.0, -1.0, 0.5, 0.0]);
        let explanation =
            explain(PredictionKind::Performance, &explainer, &[0.0; 4], &names, 3).unwrap();

        assert!(explanation.available);
        assert_eq!(explanation.method, Some(ExplanationMethod::TreeShap));
        assert_eq!(explanation.base_value, Some(70.0));
        assert_eq!(explanation.shap_values.len(), 3);
        assert_eq!(explanation.shap_values[0].shap_value, 4.0);
        assert_eq!(explanation.key_factors[1], "Age decreased the prediction by 1.000");
        assert!(explanation.narrative.unwrap().contains("Goals"));

        let json = serde_json::to_value(&explanation.top_features).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_normalized_magnitudes_sum_to_one(
            values in prop::collection::vec(-100.0f64..100.0, 1..20),
            k in 0usize..25,
        ) {
            let n = values.len();
            let ranked = rank_attributions(&values, &names(n), k).unwrap();
            let top = normalize(&ranked);

            prop_assert_eq!(top.len(), k.min(n));

            let total: f64 = top.iter().map(|c| c.contribution.abs()).sum();
            if ranked.iter().any(|c| c.shap_value != 0.0) {
                prop_assert!((total - 1.0).abs() < 1e-9);
            } else {
                prop_assert_eq!(total, 0.0);
            }

            for pair in ranked.windows(2) {
                prop_assert!(pair[0].shap_value.abs() >= pair[1].shap_value.abs());
            }
            for (raw, norm) in ranked.iter().zip(top.iter()) {
                prop_assert!(raw.shap_value * norm.contribution >= 0.0);
            }
        }
    }
}
