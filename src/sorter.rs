//! Deterministic document order from a [`SectionCatalog`].
//!
//! URLs are grouped by the first catalog section whose name appears as a path
//! segment, then by subsection. Within a group, names from the matching
//! file-order list come first in list order and the rest follow alphabetically
//! by full URL. Groups are emitted in catalog order:
//!
//! 1. declared subsections, in declared order
//! 2. subsections found on the site but not declared, alphabetically by segment
//! 3. pages sitting directly in the section directory
//!
//! URLs outside every section come last, alphabetically.
//!
//! Catalog names are matched against percent-decoded paths, so a file-order
//! entry such as `Depth Channel.html` matches `.../Depth%20Channel.html`.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::config::SectionCatalog;

/// Orders `urls` according to `catalog`. Output is a permutation of the input.
pub fn order(urls: &[String], catalog: &SectionCatalog) -> Vec<String> {
    let mut buckets: Vec<Vec<String>> = vec![Vec::new(); catalog.sections.len()];
    let mut other = Vec::new();

    for url in urls {
        match catalog
            .sections
            .iter()
            .position(|section| has_segment(url, section))
        {
            Some(index) => buckets[index].push(url.clone()),
            None => other.push(url.clone()),
        }
    }

    let mut ordered = Vec::with_capacity(urls.len());
    for (section, bucket) in catalog.sections.iter().zip(buckets) {
        debug!("Section '{}' holds {} URLs", section, bucket.len());
        if catalog.subsections_of(section).is_empty() {
            ordered.extend(order_group(bucket, catalog.file_order_for(section)));
        } else {
            ordered.extend(order_section(section, bucket, catalog));
        }
    }

    debug!("{} URLs matched no section", other.len());
    other.sort();
    ordered.extend(other);
    ordered
}

/// Moves every URL of `reference` that is present in `ordered` to the front,
/// in reference order, without duplicating it.
pub fn apply_reference_order(ordered: Vec<String>, reference: &[String]) -> Vec<String> {
    let present: HashSet<&str> = ordered.iter().map(String::as_str).collect();
    let mut prefix: Vec<String> = Vec::new();
    let mut placed: HashSet<String> = HashSet::new();

    for url in reference {
        if present.contains(url.as_str()) && placed.insert(url.clone()) {
            prefix.push(url.clone());
        }
    }

    let rest: Vec<String> = ordered
        .into_iter()
        .filter(|url| !placed.contains(url))
        .collect();
    prefix.extend(rest);
    prefix
}

fn order_section(section: &str, bucket: Vec<String>, catalog: &SectionCatalog) -> Vec<String> {
    let subsections = catalog.subsections_of(section);
    let mut declared: Vec<Vec<String>> = vec![Vec::new(); subsections.len()];
    let mut undeclared: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut local = Vec::new();

    for url in bucket {
        if let Some(index) = subsections.iter().position(|sub| has_segment(&url, sub)) {
            declared[index].push(url);
            continue;
        }

        match parent_segment(&url) {
            Some(parent) if parent != section => {
                undeclared.entry(parent.into_owned()).or_default().push(url);
            }
            _ => local.push(url),
        }
    }

    let mut ordered = Vec::new();
    for (subsection, group) in subsections.iter().zip(declared) {
        let key = format!("{}/{}", section, subsection);
        ordered.extend(order_group(group, catalog.file_order_for(&key)));
    }
    for (segment, group) in undeclared {
        debug!("Undeclared subsection '{}/{}' with {} URLs", section, segment, group.len());
        let key = format!("{}/{}", section, segment);
        ordered.extend(order_group(group, catalog.file_order_for(&key)));
    }
    ordered.extend(order_group(local, catalog.file_order_for(section)));
    ordered
}

/// Listed file names first in list order, then the rest alphabetically.
fn order_group(mut group: Vec<String>, file_order: Option<&[String]>) -> Vec<String> {
    group.sort();

    let mut ordered = Vec::with_capacity(group.len());
    for name in file_order.unwrap_or_default() {
        if let Some(index) = group.iter().position(|url| file_name(url) == name.as_str()) {
            ordered.push(group.remove(index));
        }
    }
    ordered.extend(group);
    ordered
}

fn has_segment(url: &str, segment: &str) -> bool {
    decode(url).contains(&format!("/{}/", segment))
}

fn file_name(url: &str) -> Cow<'_, str> {
    decode(url.rsplit('/').next().unwrap_or(url))
}

fn parent_segment(url: &str) -> Option<Cow<'_, str>> {
    url.rsplit('/')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .map(decode)
}

fn decode(text: &str) -> Cow<'_, str> {
    percent_decode_str(text).decode_utf8_lossy()
}
