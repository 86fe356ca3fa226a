//! LightGBM text model format (`save_model` / `model_to_string`)

use std::collections::HashMap;
use std::str::FromStr;

use super::tree::Tree;
use crate::ml::ModelError;

/// Output transform named by the `objective` header
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// `binary sigmoid:<k>`
    Binary { sigmoid: f64 },
    /// `multiclass num_class:<n>`
    Softmax,
    /// `multiclassova num_class:<n> sigmoid:<k>`
    OneVsAll { sigmoid: f64 },
    /// Regression and anything unrecognized
    Identity,
}

impl Objective {
    fn parse(value: &str) -> Self {
        let mut tokens = value.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        let sigmoid = tokens
            .filter_map(|t| t.strip_prefix("sigmoid:"))
            .find_map(|v| v.parse::<f64>().ok())
            .unwrap_or(1.0);

        match name {
            "binary" => Self::Binary { sigmoid },
            "cross_entropy" | "xentropy" => Self::Binary { sigmoid: 1.0 },
            "multiclass" | "softmax" => Self::Softmax,
            "multiclassova" | "multiclass_ova" | "ova" | "ovr" => Self::OneVsAll { sigmoid },
            _ => Self::Identity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub num_class: usize,
    pub num_tree_per_iteration: usize,
    pub max_feature_idx: usize,
    pub objective: Objective,
    pub feature_names: Vec<String>,
    pub average_output: bool,
}

#[derive(Debug, Clone)]
pub struct ParsedModel {
    pub header: Header,
    pub trees: Vec<Tree>,
}

type Fields<'a> = HashMap<&'a str, &'a str>;

fn scalar<T: FromStr>(fields: &Fields<'_>, key: &str) -> Result<Option<T>, ModelError> {
    fields
        .get(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| ModelError::Parse(format!("invalid value for {}: {}", key, v)))
        })
        .transpose()
}

fn list<T: FromStr>(fields: &Fields<'_>, key: &str) -> Result<Vec<T>, ModelError> {
    let Some(value) = fields.get(key) else {
        return Ok(Vec::new());
    };
    value
        .split_whitespace()
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| ModelError::Parse(format!("invalid entry in {}: {}", key, v)))
        })
        .collect()
}

fn parse_header(fields: &Fields<'_>, average_output: bool) -> Result<Header, ModelError> {
    let num_class = scalar(fields, "num_class")?.unwrap_or(1);
    let num_tree_per_iteration = scalar(fields, "num_tree_per_iteration")?.unwrap_or(num_class);
    let max_feature_idx: usize = scalar(fields, "max_feature_idx")?
        .ok_or_else(|| ModelError::Parse("missing max_feature_idx".to_string()))?;

    if num_tree_per_iteration == 0 {
        return Err(ModelError::Parse("num_tree_per_iteration must be positive".to_string()));
    }

    let objective = fields
        .get("objective")
        .map(|v| Objective::parse(v))
        .unwrap_or(Objective::Identity);

    let feature_names: Vec<String> = list(fields, "feature_names")?;
    if !feature_names.is_empty() && feature_names.len() != max_feature_idx + 1 {
        return Err(ModelError::Parse(format!(
            "{} feature names for max_feature_idx={}",
            feature_names.len(),
            max_feature_idx
        )));
    }

    Ok(Header {
        num_class,
        num_tree_per_iteration,
        max_feature_idx,
        objective,
        feature_names,
        average_output,
    })
}

fn parse_tree(index: usize, fields: &Fields<'_>, num_features: usize) -> Result<Tree, ModelError> {
    let num_leaves = scalar(fields, "num_leaves")?
        .ok_or_else(|| ModelError::Parse(format!("Tree={}: missing num_leaves", index)))?;

    let tree = Tree {
        num_leaves,
        split_feature: list(fields, "split_feature")?,
        split_gain: list(fields, "split_gain")?,
        threshold: list(fields, "threshold")?,
        decision_type: list(fields, "decision_type")?,
        left_child: list(fields, "left_child")?,
        right_child: list(fields, "right_child")?,
        leaf_value: list(fields, "leaf_value")?,
        leaf_count: list(fields, "leaf_count")?,
        internal_count: list(fields, "internal_count")?,
        cat_boundaries: list(fields, "cat_boundaries")?,
        cat_threshold: list(fields, "cat_threshold")?,
    };
    tree.validate(index)?;

    if let Some(&f) = tree.split_feature.iter().find(|&&f| f >= num_features) {
        return Err(ModelError::Parse(format!(
            "Tree={}: split on feature {} beyond max_feature_idx",
            index, f
        )));
    }

    Ok(tree)
}

fn key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once('=').map(|(k, v)| (k.trim(), v.trim()))
}

pub fn parse(text: &str) -> Result<ParsedModel, ModelError> {
    let mut header_fields = Fields::new();
    let mut average_output = false;
    let mut tree_blocks: Vec<Fields<'_>> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line == "end of trees" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if line.starts_with("Tree=") {
            tree_blocks.push(Fields::new());
            continue;
        }

        match (tree_blocks.last_mut(), key_value(line)) {
            (Some(block), Some((k, v))) => {
                block.insert(k, v);
            }
            (None, Some((k, v))) => {
                header_fields.insert(k, v);
            }
            (None, None) if line == "average_output" => average_output = true,
            _ => {}
        }
    }

    let header = parse_header(&header_fields, average_output)?;
    if tree_blocks.is_empty() {
        return Err(ModelError::Parse("model contains no trees".to_string()));
    }

    let num_features = header.max_feature_idx + 1;
    let trees = tree_blocks
        .iter()
        .enumerate()
        .map(|(i, fields)| parse_tree(i, fields, num_features))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedModel { header, trees })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_names() {
        assert_eq!(Objective::parse("binary sigmoid:1"), Objective::Binary { sigmoid: 1.0 });
        assert_eq!(Objective::parse("binary sigmoid:2.5"), Objective::Binary { sigmoid: 2.5 });
        assert_eq!(Objective::parse("multiclass num_class:3"), Objective::Softmax);
        assert_eq!(
            Objective::parse("multiclassova num_class:3 sigmoid:1"),
            Objective::OneVsAll { sigmoid: 1.0 }
        );
        assert_eq!(Objective::parse("xentropy"), Objective::Binary { sigmoid: 1.0 });
        assert_eq!(Objective::parse("regression"), Objective::Identity);
    }

    #[test]
    fn test_header_and_trees() {
        let text = "tree\nversion=v4\nnum_class=1\nnum_tree_per_iteration=1\nmax_feature_idx=0\n\
                    objective=binary sigmoid:1\nfeature_names=x\naverage_output\n\n\
                    Tree=0\nnum_leaves=1\nleaf_value=0.5\nleaf_count=10\nshrinkage=1\n\n\
                    end of trees\n\nparameters:\n[boosting: rf]\nend of parameters\n";
        let model = parse(text).unwrap();
        assert!(model.header.average_output);
        assert_eq!(model.header.feature_names, vec!["x"]);
        assert_eq!(model.trees.len(), 1);
        assert_eq!(model.trees[0].leaf_value, vec![0.5]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse("hello world").is_err());
        assert!(parse("max_feature_idx=0\nobjective=binary\n").is_err());
        assert!(parse("max_feature_idx=0\nTree=0\nnum_leaves=2\nleaf_value=1\n").is_err());
        assert!(parse(
            "max_feature_idx=0\nTree=0\nnum_leaves=2\nsplit_feature=3\nthreshold=0\n\
             decision_type=2\nleft_child=-1\nright_child=-2\nleaf_value=0 1\n"
        )
        .is_err());
    }
}
