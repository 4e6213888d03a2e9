use crate::{
    models::{
        Clause, Configuration, Distribution, FeatureConfig, FeatureKind, FeatureState, ServingRule,
        TargetMap, Variation, VariationMap,
    },
    rules::SEGMENT_MATCH,
    sharder::Sharder,
    Target,
};

const ONE_HUNDRED: u32 = 100;

/// Evaluates flags of a configuration snapshot.
pub struct Evaluator<'a, S> {
    configuration: &'a Configuration,
    sharder: &'a S,
}

impl<'a, S: Sharder> Evaluator<'a, S> {
    pub fn new(configuration: &'a Configuration, sharder: &'a S) -> Self {
        Evaluator {
            configuration,
            sharder,
        }
    }

    /// Evaluate a flag for `target`. Returns `None` if the flag does not exist, is of another
    /// kind, or no variation can be resolved.
    pub fn evaluate(
        &self,
        flag_key: &str,
        target: &Target,
        expected: FeatureKind,
    ) -> Option<&'a Variation> {
        let flag = self.configuration.flags.get(flag_key)?;
        if flag.kind != expected {
            log::warn!(target: "ff_wrapper",
                flag_key,
                target_identifier = target.identifier.as_str();
                "flag kind mismatch, expected {:?} but flag is {:?}", expected, flag.kind);
            return None;
        }

        if !flag.prerequisites.is_empty() && !self.check_prerequisites(flag, target, 0) {
            return find_variation(&flag.variations, &flag.off_variation);
        }

        let variation = self.evaluate_flag(flag, target);
        log::trace!(target: "ff_wrapper",
            flag_key,
            target_identifier = target.identifier.as_str(),
            variation:serde = variation.map(|v| v.identifier.as_str());
            "evaluated a flag");
        variation
    }

    fn evaluate_flag(&self, flag: &'a FeatureConfig, target: &Target) -> Option<&'a Variation> {
        let identifier = match flag.state {
            FeatureState::Off => Some(flag.off_variation.as_str()),
            FeatureState::On => self
                .evaluate_variation_map(&flag.variation_to_target_map, target)
                .or_else(|| self.evaluate_rules(&flag.rules, target))
                .or_else(|| {
                    flag.default_serve
                        .distribution
                        .as_ref()
                        .and_then(|distribution| self.evaluate_distribution(distribution, target))
                })
                .or(flag.default_serve.variation.as_deref()),
        }?;
        find_variation(&flag.variations, identifier)
    }

    fn evaluate_variation_map(
        &self,
        variation_maps: &'a [VariationMap],
        target: &Target,
    ) -> Option<&'a str> {
        variation_maps
            .iter()
            .find(|map| {
                map.targets
                    .iter()
                    .any(|t| t.identifier == target.identifier)
                    || (!map.target_segments.is_empty()
                        && self.is_target_in_segments(&map.target_segments, target))
            })
            .map(|map| map.variation.as_str())
    }

    fn evaluate_rules(&self, rules: &'a [ServingRule], target: &Target) -> Option<&'a str> {
        let mut sorted: Vec<&ServingRule> = rules.iter().collect();
        sorted.sort_by_key(|rule| rule.priority);

        for rule in sorted {
            if !self.evaluate_clauses(&rule.clauses, target) {
                continue;
            }
            if let Some(distribution) = &rule.serve.distribution {
                return self.evaluate_distribution(distribution, target);
            }
            if let Some(variation) = &rule.serve.variation {
                return Some(variation.as_str());
            }
        }
        None
    }

    fn evaluate_clauses(&self, clauses: &[Clause], target: &Target) -> bool {
        clauses.iter().all(|clause| self.evaluate_clause(clause, target))
    }

    fn evaluate_clause(&self, clause: &Clause, target: &Target) -> bool {
        if clause.op == SEGMENT_MATCH {
            return self.is_target_in_segments(&clause.values, target);
        }
        clause.eval_attribute(target)
    }

    /// Returns the last weighted variation if the target falls into none of the buckets.
    fn evaluate_distribution(
        &self,
        distribution: &'a Distribution,
        target: &Target,
    ) -> Option<&'a str> {
        let last = distribution.variations.last()?;
        let Some(value) = target.get_attribute(&distribution.bucket_by) else {
            return Some(last.variation.as_str());
        };
        let bucket = self
            .sharder
            .get_bucket(&format!("{}:{}", distribution.bucket_by, value), ONE_HUNDRED);

        // Each weight is compared on its own, not as a running total.
        distribution
            .variations
            .iter()
            .find(|weighted| weighted.weight > 0 && bucket <= weighted.weight)
            .or(Some(last))
            .map(|weighted| weighted.variation.as_str())
    }

    fn is_target_in_segments(&self, segment_identifiers: &[String], target: &Target) -> bool {
        segment_identifiers.iter().any(|identifier| {
            let Some(segment) = self.configuration.segments.get(identifier) else {
                return false;
            };
            if is_target_in_list(target, &segment.excluded) {
                return false;
            }
            if is_target_in_list(target, &segment.included) {
                return true;
            }
            !segment.rules.is_empty() && self.evaluate_clauses(&segment.rules, target)
        })
    }

    fn check_prerequisites(&self, flag: &FeatureConfig, target: &Target, depth: usize) -> bool {
        // Guards against cyclic prerequisites in a broken configuration.
        const MAX_DEPTH: usize = 32;
        if depth > MAX_DEPTH {
            log::warn!(target: "ff_wrapper", flag_key = flag.feature.as_str(); "prerequisite chain is too deep");
            return false;
        }

        flag.prerequisites.iter().all(|prerequisite| {
            let Some(parent) = self.configuration.flags.get(&prerequisite.feature) else {
                log::warn!(target: "ff_wrapper", "could not retrieve prerequisite flag {}", prerequisite.feature);
                return true;
            };
            let Some(variation) = self.evaluate_flag(parent, target) else {
                log::warn!(target: "ff_wrapper", "could not evaluate prerequisite flag {}", prerequisite.feature);
                return true;
            };
            // Allowed variations are listed by value.
            prerequisite
                .variations
                .iter()
                .any(|allowed| allowed == &variation.value)
                && self.check_prerequisites(parent, target, depth + 1)
        })
    }
}

fn is_target_in_list(target: &Target, list: &[TargetMap]) -> bool {
    list.iter().any(|t| t.identifier == target.identifier)
}

fn find_variation<'a>(variations: &'a [Variation], identifier: &str) -> Option<&'a Variation> {
    variations.iter().find(|v| v.identifier == identifier)
}
