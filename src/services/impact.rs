//! Projected energy cost of UI architectures.

use serde::Serialize;

use crate::config::Rules;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSuggestion {
    pub nombre: &'static str,
    pub tipo: &'static str,
    pub kwh: f64,
    pub alternativa_a: &'static str,
}

/// Eco alternatives offered to the architecture editor.
pub fn eco_alternatives() -> Vec<ComponentSuggestion> {
    vec![
        ComponentSuggestion {
            nombre: "Cargador de Imagen Eco",
            tipo: "eco-image-loader",
            kwh: 0.07,
            alternativa_a: "image",
        },
        ComponentSuggestion {
            nombre: "Reproductor de Video Eco",
            tipo: "eco-video-player",
            kwh: 0.30,
            alternativa_a: "video",
        },
        ComponentSuggestion {
            nombre: "Formulario Eficiente",
            tipo: "eco-form",
            kwh: 0.10,
            alternativa_a: "form",
        },
    ]
}

/// Sum of per-component costs; unknown types fall back to the default cost.
pub fn projected_kwh<S: AsRef<str>>(rules: &Rules, components: &[S]) -> f64 {
    components.iter().map(|c| rules.component_cost(c.as_ref())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_known_and_unknown_components() {
        let rules = Rules::default();
        let total = projected_kwh(&rules, &["image", "div", "unknown-x"]);
        assert!((total - 0.17).abs() < 1e-9);
    }

    #[test]
    fn empty_architecture_costs_nothing() {
        let rules = Rules::default();
        assert_eq!(projected_kwh::<&str>(&rules, &[]), 0.0);
    }

    #[test]
    fn overridden_table_is_respected() {
        let mut rules = Rules::default();
        rules.default_component_cost = 1.0;
        rules.component_costs.insert("image".into(), 2.0);
        assert_eq!(projected_kwh(&rules, &["image", "mystery"]), 3.0);
    }

    #[test]
    fn alternatives_point_at_known_components() {
        let rules = Rules::default();
        for alt in eco_alternatives() {
            assert!(rules.component_costs.contains_key(alt.alternativa_a));
            assert_eq!(rules.component_cost(alt.tipo), alt.kwh);
        }
    }
}
