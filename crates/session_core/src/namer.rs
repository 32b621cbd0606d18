/// Return `root` if no existing name conflicts with it, otherwise `root`
/// plus one more than the highest integer suffix already in use: the first
/// duplicate of "layer" becomes "layer1", a later duplicate of "layer1"
/// becomes "layer2". Freed lower suffixes are not reused.
pub fn unique_layer_name<'a>(existing: impl IntoIterator<Item = &'a str>, root: &str) -> String {
    let mut conflict_level = 0u64;
    for name in existing {
        let Some(suffix) = name.strip_prefix(root) else {
            continue;
        };
        if suffix.is_empty() {
            conflict_level = conflict_level.max(1);
            continue;
        }
        if let Ok(number) = suffix.parse::<u64>() {
            // "01" and friends are names in their own right, not suffixes
            if suffix == number.to_string() {
                conflict_level = conflict_level.max(number + 1);
            }
        }
    }
    if conflict_level == 0 {
        root.to_string()
    } else {
        format!("{root}{conflict_level}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_root_unmodified_when_unused() {
        assert_eq!(unique_layer_name([], "layer"), "layer");
        assert_eq!(unique_layer_name(["other"], "layer"), "layer");
    }

    #[test]
    fn yields_a_gapless_sequence_when_each_result_is_registered() {
        let mut registered: Vec<String> = Vec::new();
        for expected in ["layer", "layer1", "layer2", "layer3"] {
            let name =
                unique_layer_name(registered.iter().map(String::as_str), "layer");
            assert_eq!(name, expected);
            registered.push(name);
        }
    }

    #[test]
    fn always_picks_one_more_than_the_maximum_suffix() {
        // closing "layer1" does not free its slot while "layer2" remains
        assert_eq!(
            unique_layer_name(["layer", "layer2"], "layer"),
            "layer3"
        );
    }

    #[test]
    fn ignores_non_integer_and_zero_padded_suffixes() {
        assert_eq!(
            unique_layer_name(["layer01", "layer abc"], "layer"),
            "layer"
        );
    }

    #[test]
    fn root_match_alone_counts_as_level_one() {
        assert_eq!(unique_layer_name(["layer"], "layer"), "layer1");
    }
}
