//! Canonicalization of user config lists into sparsity groups.

use std::collections::{BTreeSet, HashMap};

use super::sparsity::SparsityConfig;
use super::user::UserSparsityConfig;
use crate::error::{PodarError, Result};
use crate::model::ModelLayout;

/// Target of one entry after alias resolution.
#[derive(Debug, Clone, Copy)]
enum Target {
    PerLayer(f64),
    Total(f64),
    Exclude,
}

/// Split a user config list into canonical groups.
///
/// Every op of the result belongs to exactly one group. Later entries win
/// over earlier ones for ops they both select, except that naming the same
/// op explicitly in two entries' `op_names` is rejected. Errors are raised
/// before any artifact is written.
pub fn canonicalize(
    model: &ModelLayout,
    config_list: &[UserSparsityConfig],
) -> Result<Vec<SparsityConfig>> {
    let targets = config_list
        .iter()
        .enumerate()
        .map(|(idx, config)| resolve_target(idx, config))
        .collect::<Result<Vec<_>>>()?;

    check_explicit_names(model, config_list, &targets)?;

    // Unfold each entry to the ops it selects, in model order.
    let mut unfolded: Vec<Vec<String>> = config_list
        .iter()
        .map(|config| select_ops(model, config))
        .collect();

    // Dedupe from the back: later entries and exclusions take precedence.
    let mut taken: BTreeSet<String> = BTreeSet::new();
    for (ops, target) in unfolded.iter_mut().zip(&targets).rev() {
        if matches!(target, Target::Exclude) {
            taken.extend(ops.drain(..));
            continue;
        }
        let kept: Vec<String> = ops.drain(..).filter(|op| !taken.contains(op)).collect();
        taken.extend(kept.iter().cloned());
        ops.extend(kept);
    }

    let mut groups = Vec::new();
    for (ops, target) in unfolded.into_iter().zip(targets) {
        match target {
            Target::Exclude => {}
            Target::PerLayer(sparsity) => {
                groups.extend(ops.into_iter().map(|op| SparsityConfig::single(op, sparsity)));
            }
            Target::Total(sparsity) if !ops.is_empty() => {
                groups.push(SparsityConfig::new(ops, sparsity));
            }
            Target::Total(_) => {}
        }
    }
    Ok(groups)
}

fn resolve_target(idx: usize, config: &UserSparsityConfig) -> Result<Target> {
    if config.exclude {
        return Ok(Target::Exclude);
    }
    if config.sparsity.is_some() && config.sparsity_per_layer.is_some() {
        return Err(PodarError::config(
            format!("config_list[{idx}]"),
            "'sparsity' and 'sparsity_per_layer' have the same semantics, can not set both",
        ));
    }
    let per_layer = config.sparsity.or(config.sparsity_per_layer);
    let (target, value) = match (per_layer, config.total_sparsity) {
        (Some(s), None) => (Target::PerLayer(s), s),
        (None, Some(s)) => (Target::Total(s), s),
        (Some(_), Some(_)) => {
            return Err(PodarError::config(
                format!("config_list[{idx}]"),
                "set either a per-layer sparsity or 'total_sparsity', not both",
            ))
        }
        (None, None) => {
            return Err(PodarError::config(
                format!("config_list[{idx}]"),
                "sparsity must be set in every non-exclude config",
            ))
        }
    };
    if !(0.0..1.0).contains(&value) {
        return Err(PodarError::config(
            format!("config_list[{idx}]"),
            format!("sparsity ({value}) must be in [0, 1)"),
        ));
    }
    Ok(target)
}

fn check_explicit_names(
    model: &ModelLayout,
    config_list: &[UserSparsityConfig],
    targets: &[Target],
) -> Result<()> {
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (idx, (config, target)) in config_list.iter().zip(targets).enumerate() {
        for name in config.op_names.iter().flatten() {
            if !model.contains(name) {
                return Err(PodarError::config(
                    format!("config_list[{idx}].op_names"),
                    format!("unknown op '{name}'"),
                ));
            }
            if matches!(target, Target::Exclude) {
                continue;
            }
            if let Some(first) = owner.insert(name.as_str(), idx) {
                if first != idx {
                    return Err(PodarError::config(
                        format!("config_list[{idx}].op_names"),
                        format!("op '{name}' is already assigned by config_list[{first}]"),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn select_ops(model: &ModelLayout, config: &UserSparsityConfig) -> Vec<String> {
    let mut names: Option<BTreeSet<&str>> = config
        .op_names
        .as_ref()
        .map(|names| names.iter().map(String::as_str).collect());

    if let Some(partials) = &config.op_partial_names {
        let matched = model
            .ops()
            .iter()
            .filter(|op| partials.iter().any(|p| op.name.contains(p.as_str())))
            .map(|op| op.name.as_str());
        names.get_or_insert_with(BTreeSet::new).extend(matched);
    }

    model
        .ops()
        .iter()
        .filter(|op| {
            config
                .op_types
                .as_ref()
                .is_none_or(|types| types.iter().any(|t| *t == op.op_type))
        })
        .filter(|op| names.as_ref().is_none_or(|n| n.contains(op.name.as_str())))
        .map(|op| op.name.clone())
        .collect()
}
