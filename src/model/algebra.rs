//! Pure operations on catalog values
//!
//! None of these functions mutate their inputs. Merging is append-only:
//! datasets, data services and distributions are concatenated without any
//! de-duplication, properties are combined with the source winning on key
//! conflicts.

use crate::model::{Catalog, DatasetNode};

/// Creates a copy of the given catalog
pub fn copy(catalog: &Catalog) -> Catalog {
    catalog.clone()
}

/// Creates a copy of the given catalog whose dataset list is replaced
pub fn copy_with_datasets(catalog: &Catalog, datasets: Vec<DatasetNode>) -> Catalog {
    Catalog {
        id: catalog.id.clone(),
        participant_id: catalog.participant_id.clone(),
        properties: catalog.properties.clone(),
        data_services: catalog.data_services.clone(),
        datasets,
        distributions: catalog.distributions.clone(),
    }
}

/// Appends everything `source` holds to a copy of `destination`
///
/// The result keeps the destination's id and participant id.
pub fn merge(destination: &Catalog, source: &Catalog) -> Catalog {
    let mut merged = copy(destination);
    merged.datasets.extend(source.datasets.iter().cloned());
    merged.data_services.extend(source.data_services.iter().cloned());
    merged.distributions.extend(source.distributions.iter().cloned());
    merged.properties.extend(
        source
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    merged
}

/// Promotes the datasets of every nested catalog to the top level
///
/// The root keeps its identity. Sub-catalogs are flattened recursively,
/// folded together with [`merge`] and then merged into the root, so the
/// result contains no `DatasetNode::Catalog` entries. A catalog without
/// sub-catalogs is returned unchanged.
pub fn flatten(root: &Catalog) -> Catalog {
    let (nested, plain): (Vec<&DatasetNode>, Vec<&DatasetNode>) =
        root.datasets.iter().partition(|node| node.is_catalog());

    let flattened_root = copy_with_datasets(root, plain.into_iter().cloned().collect());

    nested
        .into_iter()
        .filter_map(|node| match node {
            DatasetNode::Catalog(sub) => Some(flatten(sub)),
            DatasetNode::Dataset(_) => None,
        })
        .reduce(|folded, next| merge(&folded, &next))
        .map(|subtree| merge(&flattened_root, &subtree))
        .unwrap_or(flattened_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataService, Dataset, Distribution};

    fn leaf_catalog() -> Catalog {
        Catalog::new("leaf")
            .with_participant_id("provider")
            .with_property("region", "eu")
            .with_data_service(DataService::new("svc", Some("https://leaf".to_string())))
            .with_dataset(Dataset::new("d1"))
            .with_dataset(Dataset::new("d2"))
            .with_distribution(Distribution::new("json", "svc"))
    }

    fn catalog_with_datasets(id: &str, count: usize) -> Catalog {
        (0..count).fold(Catalog::new(id), |catalog, i| {
            catalog.with_dataset(Dataset::new(format!("{}-d{}", id, i)))
        })
    }

    fn count_datasets(catalog: &Catalog) -> usize {
        catalog.datasets.len()
    }

    #[test]
    fn test_flatten_without_sub_catalogs_is_identity() {
        let catalog = leaf_catalog();
        assert_eq!(flatten(&catalog), catalog);
    }

    #[test]
    fn test_flatten_promotes_nested_datasets() {
        let sub_a = catalog_with_datasets("a", 2);
        let sub_c = catalog_with_datasets("c", 1);
        let sub_b = catalog_with_datasets("b", 1).with_sub_catalog(sub_c);
        let root = catalog_with_datasets("root", 3)
            .with_sub_catalog(sub_a)
            .with_sub_catalog(sub_b);

        let flat = flatten(&root);

        assert_eq!(count_datasets(&flat), 3 + 2 + 1 + 1);
        assert!(flat.datasets.iter().all(|node| !node.is_catalog()));
        assert_eq!(flat.id, "root");
    }

    #[test]
    fn test_flatten_keeps_root_datasets_first() {
        let root = catalog_with_datasets("root", 1).with_sub_catalog(catalog_with_datasets("a", 1));

        let ids: Vec<_> = flatten(&root).datasets.iter().map(|d| d.id().to_string()).collect();

        assert_eq!(ids, vec!["root-d0", "a-d0"]);
    }

    #[test]
    fn test_flatten_collects_sub_catalog_services() {
        let sub = catalog_with_datasets("a", 1)
            .with_data_service(DataService::new("sub-svc", Some("https://sub".to_string())));
        let root = Catalog::new("root")
            .with_data_service(DataService::new("root-svc", None))
            .with_sub_catalog(sub);

        let flat = flatten(&root);

        let services: Vec<_> = flat.data_services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(services, vec!["root-svc", "sub-svc"]);
    }

    #[test]
    fn test_merge_appends_without_dedup() {
        let x = catalog_with_datasets("x", 2);
        let y = catalog_with_datasets("y", 3);
        let z = catalog_with_datasets("z", 1);

        let merged = merge(&merge(&x, &y), &z);
        assert_eq!(count_datasets(&merged), 2 + 3 + 1);

        // the same dataset twice stays twice
        let twice = merge(&x, &x);
        assert_eq!(count_datasets(&twice), 4);
        assert_eq!(twice.datasets[0], twice.datasets[2]);
    }

    #[test]
    fn test_merge_keeps_destination_identity_and_inputs() {
        let destination = leaf_catalog();
        let source = Catalog::new("other")
            .with_participant_id("someone-else")
            .with_property("region", "us")
            .with_property("tier", "gold")
            .with_distribution(Distribution::new("csv", "svc"));

        let merged = merge(&destination, &source);

        assert_eq!(merged.id, "leaf");
        assert_eq!(merged.participant_id.as_deref(), Some("provider"));
        assert_eq!(merged.properties["region"], "us");
        assert_eq!(merged.properties["tier"], "gold");
        assert_eq!(merged.distributions.len(), 2);
        assert_eq!(destination, leaf_catalog());
    }

    #[test]
    fn test_copy_with_datasets_replaces_list() {
        let catalog = leaf_catalog();
        let copy = copy_with_datasets(&catalog, vec![DatasetNode::Dataset(Dataset::new("only"))]);

        assert_eq!(copy.datasets.len(), 1);
        assert_eq!(copy.data_services, catalog.data_services);
        assert_eq!(copy.properties, catalog.properties);
        assert_eq!(catalog.datasets.len(), 2);
    }
}
