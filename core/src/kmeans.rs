//! K-means over the forward index.
//!
//! Centroids are dense vectors over the whole vocabulary. Documents are never
//! densified: distances walk a document's forward list in term order alongside the
//! centroid. A document's weight for a term is `count / length`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::KMeansConfig;
use crate::document::RawDocument;
use crate::error::{IndexError, Result};
use crate::index::{ClassId, DocId, TotalIndex, UNASSIGNED};
use crate::parallel::{parallel_check, parallel_collect, WorkQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// RSS improved by less than the tolerance.
    Converged,
    IterationLimitReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansRun {
    /// RSS recorded at the start of every iteration that followed an assignment.
    pub rss: Vec<f64>,
    /// Completed assignment + recenter passes.
    pub iterations: usize,
    pub termination: Termination,
}

/// Clusters every document of `index` into `config.k` clusters.
///
/// Writes `cluster_id` on every document and leaves the final centroids in
/// `index.centroids`.
pub fn kmeans<R: Rng>(
    index: &mut TotalIndex,
    config: &KMeansConfig,
    rng: &mut R,
) -> Result<KMeansRun> {
    let mut config = config.clone();
    config.validate(index.document_count())?;

    let mut centroids = seed_centroids(index, config.k, rng)?;
    for info in &mut index.documents {
        info.cluster_id = UNASSIGNED;
    }
    index.centroids.clear();

    let mut trajectory: Vec<f64> = Vec::new();
    let mut termination = Termination::IterationLimitReached;
    let mut iterations = 0;

    for iteration in 0..config.max_iterations {
        if let Some(rss) = rss(index, &centroids)? {
            tracing::debug!(iteration, rss, "k-means iteration");
            trajectory.push(rss);
            if let [.., previous, current] = trajectory.as_slice() {
                if previous - current < config.tolerance {
                    termination = Termination::Converged;
                    break;
                }
            }
        }

        let assignments = assign(index, &centroids, config.workers)?;
        for (info, cluster) in index.documents.iter_mut().zip(assignments) {
            info.cluster_id = cluster;
        }
        recenter(index, &mut centroids, config.workers)?;
        iterations += 1;
    }

    tracing::info!(
        k = config.k,
        iterations,
        outcome = ?termination,
        rss = trajectory.last().copied().unwrap_or_default(),
        "k-means finished"
    );
    index.centroids = centroids;
    Ok(KMeansRun { rss: trajectory, iterations, termination })
}

/// Normalises forward postings, then clusters.
pub fn normalise_and_cluster<R: Rng>(
    index: &mut TotalIndex,
    config: &KMeansConfig,
    rng: &mut R,
) -> Result<KMeansRun> {
    index.normalise();
    kmeans(index, config, rng)
}

fn term_frequency(count: u32, length: u32) -> f64 {
    if length == 0 {
        return 0.0;
    }
    f64::from(count) / f64::from(length)
}

/// Draws `k` distinct document ids, keeping draw order.
fn sample_documents<R: Rng>(documents: usize, k: usize, rng: &mut R) -> Vec<DocId> {
    let mut seen = HashSet::with_capacity(k);
    let mut drawn = Vec::with_capacity(k);
    while drawn.len() < k {
        let doc = rng.random_range(0..documents) as DocId;
        if seen.insert(doc) {
            drawn.push(doc);
        }
    }
    drawn
}

fn seed_centroids<R: Rng>(index: &TotalIndex, k: usize, rng: &mut R) -> Result<Vec<Vec<f64>>> {
    let dimensions = index.term_count();
    let mut centroids = Vec::with_capacity(k);
    for doc in sample_documents(index.document_count(), k, rng) {
        let mut centroid = vec![0.0; dimensions];
        for (term, tf) in document_vector(index, doc)? {
            *dimension(&mut centroid, term, doc)? = tf;
        }
        tracing::trace!(doc, "seeded centroid");
        centroids.push(centroid);
    }
    Ok(centroids)
}

fn dimension(vector: &mut [f64], term: usize, doc: DocId) -> Result<&mut f64> {
    let dimensions = vector.len();
    vector.get_mut(term).ok_or_else(|| {
        IndexError::corruption(format!("document {doc} posts term {term} of {dimensions}"))
    })
}

/// Sparse `(term, tf)` view of one document, in increasing term order.
fn document_vector(
    index: &TotalIndex,
    doc: DocId,
) -> Result<impl Iterator<Item = (usize, f64)> + '_> {
    let length = index
        .document(doc)
        .ok_or_else(|| IndexError::corruption(format!("no document {doc}")))?
        .length;
    Ok(index
        .document_postings(doc)?
        .map(move |p| (p.entity_id as usize, term_frequency(p.count, length))))
}

/// Squared euclidean distance between a dense centroid and a sparse vector sorted
/// by dimension.
pub fn squared_distance<I>(centroid: &[f64], sparse: I) -> f64
where
    I: IntoIterator<Item = (usize, f64)>,
{
    let mut sparse = sparse.into_iter();
    let mut next = sparse.next();
    let mut sum = 0.0;
    for (dimension, &value) in centroid.iter().enumerate() {
        match next {
            Some((posted, weight)) if posted == dimension => {
                sum += sqr(value - weight);
                next = sparse.next();
            }
            _ => sum += sqr(value),
        }
    }
    sum
}

fn sqr(x: f64) -> f64 {
    x * x
}

pub fn document_distance(index: &TotalIndex, centroid: &[f64], doc: DocId) -> Result<f64> {
    Ok(squared_distance(centroid, document_vector(index, doc)?))
}

/// Index of the nearest centroid; the lowest index wins ties.
fn nearest<F>(centroids: &[Vec<f64>], mut distance: F) -> Result<usize>
where
    F: FnMut(&[f64]) -> Result<f64>,
{
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = distance(centroid)?;
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    Ok(best)
}

pub fn closest_centroid(index: &TotalIndex, centroids: &[Vec<f64>], doc: DocId) -> Result<usize> {
    nearest(centroids, |centroid| document_distance(index, centroid, doc))
}

/// Assignment pass. Each worker owns the documents it pops, so every slot is
/// written exactly once.
fn assign(index: &TotalIndex, centroids: &[Vec<f64>], workers: usize) -> Result<Vec<i32>> {
    let documents = index.document_count();
    let queue = WorkQueue::new(0..documents as DocId);
    let slots: Vec<AtomicI32> = (0..documents).map(|_| AtomicI32::new(UNASSIGNED)).collect();

    parallel_check(
        |_| {
            while let Some(doc) = queue.pop() {
                let cluster = closest_centroid(index, centroids, doc)?;
                slots[doc as usize].store(cluster as i32, Ordering::Relaxed);
            }
            Ok(())
        },
        workers,
    )?;

    Ok(slots.into_iter().map(AtomicI32::into_inner).collect())
}

/// Recenter pass. Work is split by cluster: one worker sums every member of a
/// cluster in document order, so the result does not depend on the worker count
/// and no two workers touch the same centroid. Peak memory is two dense vectors
/// per cluster. A cluster that lost all its documents keeps its old centroid.
fn recenter(index: &TotalIndex, centroids: &mut [Vec<f64>], workers: usize) -> Result<()> {
    let k = centroids.len();
    let dimensions = index.term_count();
    let mut members: Vec<Vec<DocId>> = vec![Vec::new(); k];
    for doc in 0..index.document_count() as DocId {
        members[assigned_cluster(index, doc, k)?].push(doc);
    }

    let queue = WorkQueue::new(0..k);
    let sums = parallel_collect(&queue, workers, |queue, out| {
        while let Some(cluster) = queue.pop() {
            if members[cluster].is_empty() {
                continue;
            }
            let mut sum = vec![0.0; dimensions];
            for &doc in &members[cluster] {
                for (term, tf) in document_vector(index, doc)? {
                    *dimension(&mut sum, term, doc)? += tf;
                }
            }
            let _ = out.send((cluster, sum));
        }
        Ok(())
    })?;

    for (cluster, sum) in sums {
        let size = members[cluster].len() as f64;
        for (value, s) in centroids[cluster].iter_mut().zip(sum) {
            *value = s / size;
        }
    }
    for (cluster, docs) in members.iter().enumerate() {
        if docs.is_empty() {
            tracing::warn!(cluster, "empty cluster keeps its previous centroid");
        }
    }
    Ok(())
}

fn assigned_cluster(index: &TotalIndex, doc: DocId, k: usize) -> Result<usize> {
    let info = index
        .document(doc)
        .ok_or_else(|| IndexError::corruption(format!("no document {doc}")))?;
    match info.cluster() {
        Some(cluster) if cluster < k => Ok(cluster),
        Some(cluster) => Err(IndexError::input(format!(
            "document {doc} is in cluster {cluster}, outside 0..{k}"
        ))),
        None => Err(IndexError::NotClustered),
    }
}

/// Residual sum of squares, or `None` while some document is unassigned.
pub fn rss(index: &TotalIndex, centroids: &[Vec<f64>]) -> Result<Option<f64>> {
    let mut sum = 0.0;
    for doc in 0..index.document_count() as DocId {
        match assigned_cluster(index, doc, centroids.len()) {
            Ok(cluster) => sum += document_distance(index, &centroids[cluster], doc)?,
            Err(IndexError::NotClustered) => return Ok(None),
            Err(err) => return Err(err),
        }
    }
    Ok(Some(sum))
}

/// Nearest centroid of the last run for a document outside the index. Terms the
/// dictionary does not know are dropped.
pub fn closest_centroid_to_info(index: &TotalIndex, doc: &RawDocument) -> Result<usize> {
    if index.centroids.is_empty() {
        return Err(IndexError::NotClustered);
    }
    if let Some(centroid) = index.centroids.iter().find(|c| c.len() != index.term_count()) {
        return Err(IndexError::input(format!(
            "centroid has {} dimensions, index has {} terms",
            centroid.len(),
            index.term_count()
        )));
    }

    let mut vector: Vec<(usize, f64)> = Vec::with_capacity(doc.terms.len());
    doc.terms.for_each(|term, count| {
        if let Some(id) = index.dictionary.lookup(term) {
            vector.push((id as usize, term_frequency(count, doc.length)));
        }
    });
    vector.sort_unstable_by_key(|&(term, _)| term);

    nearest(&index.centroids, |centroid| {
        Ok(squared_distance(centroid, vector.iter().copied()))
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Purity {
    pub purity: f64,
    /// Class id -> member count, per cluster.
    pub class_counts: Vec<HashMap<ClassId, usize>>,
}

/// Share of labelled documents that carry their cluster's most frequent class.
pub fn purity(index: &TotalIndex, k: usize) -> Result<Purity> {
    let mut class_counts = vec![HashMap::new(); k];
    let mut labelled = 0usize;

    for (doc, info) in index.documents.iter().enumerate() {
        if info.class_ids.is_empty() {
            continue;
        }
        labelled += 1;
        let cluster = assigned_cluster(index, doc as DocId, k)?;
        for &class in &info.class_ids {
            *class_counts[cluster].entry(class).or_insert(0) += 1;
        }
    }

    let majority: usize = class_counts
        .iter()
        .map(|counts| counts.values().copied().max().unwrap_or(0))
        .sum();
    let purity = if labelled == 0 { 0.0 } else { majority as f64 / labelled as f64 };
    Ok(Purity { purity, class_counts })
}

/// Documents per cluster.
pub fn cluster_sizes(index: &TotalIndex, k: usize) -> Result<Vec<usize>> {
    let mut sizes = vec![0; k];
    for doc in 0..index.document_count() as DocId {
        sizes[assigned_cluster(index, doc, k)?] += 1;
    }
    Ok(sizes)
}

/// Up to `n` classes of one cluster, most frequent first, smaller id on ties.
pub fn top_classes(class_counts: &HashMap<ClassId, usize>, n: usize) -> Vec<ClassId> {
    let mut ranked: Vec<(ClassId, usize)> = class_counts.iter().map(|(&class, &count)| (class, count)).collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(class, _)| class).collect()
}

/// `table[class][cluster]` = documents of that class in that cluster.
pub fn contingency_table(index: &TotalIndex, k: usize) -> Result<Vec<Vec<usize>>> {
    let mut table = vec![vec![0; k]; index.classes.len()];
    for (doc, info) in index.documents.iter().enumerate() {
        if info.class_ids.is_empty() {
            continue;
        }
        let cluster = assigned_cluster(index, doc as DocId, k)?;
        for &class in &info.class_ids {
            let row = table.get_mut(class as usize).ok_or_else(|| {
                IndexError::corruption(format!("document {doc} has unknown class {class}"))
            })?;
            row[cluster] += 1;
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn distance_walks_sparse_and_dense_together() {
        let centroid = [0.5, 0.0, 1.0, 0.25];
        let d = squared_distance(&centroid, vec![(0, 0.5), (2, 0.5)]);
        // 0 + 0 + 0.25 + 0.0625
        assert!((d - 0.3125).abs() < 1e-12);
        assert!((squared_distance(&centroid, Vec::new()) - 1.3125).abs() < 1e-12);
    }

    #[test]
    fn ties_go_to_lowest_centroid() {
        let centroids = vec![vec![1.0], vec![1.0], vec![0.0]];
        let best = nearest(&centroids, |c| Ok(squared_distance(c, vec![(0, 0.5)]))).unwrap();
        assert_eq!(best, 0);
    }

    #[test]
    fn sampling_draws_distinct_documents() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut drawn = sample_documents(10, 10, &mut rng);
        drawn.sort_unstable();
        assert_eq!(drawn, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn term_frequency_of_empty_document_is_zero() {
        assert_eq!(term_frequency(3, 0), 0.0);
        assert_eq!(term_frequency(1, 4), 0.25);
    }

    #[test]
    fn empty_cluster_keeps_previous_centroid() {
        let mut index = TotalIndex::new();
        index
            .add(&RawDocument::new("d0", vec![], 2).with_term("a", 1).with_term("b", 1))
            .unwrap();
        index.add(&RawDocument::new("d1", vec![], 1).with_term("a", 1)).unwrap();
        for info in &mut index.documents {
            info.cluster_id = 0;
        }

        let mut centroids = vec![vec![0.0, 0.0], vec![9.0, 9.0]];
        recenter(&index, &mut centroids, 2).unwrap();
        assert_eq!(centroids[0], vec![0.75, 0.25]);
        assert_eq!(centroids[1], vec![9.0, 9.0]);
    }

    #[test]
    fn recenter_is_independent_of_worker_count() {
        let mut index = TotalIndex::new();
        for i in 0..40u32 {
            let doc = RawDocument::new(format!("d{i}"), vec![], 7)
                .with_term(&format!("t{}", i % 5), 3)
                .with_term(&format!("u{}", i % 3), 1 + i % 4);
            index.add(&doc).unwrap();
        }
        for (i, info) in index.documents.iter_mut().enumerate() {
            info.cluster_id = (i % 3) as i32;
        }

        let start = vec![vec![0.0; index.term_count()]; 3];
        let mut single = start.clone();
        recenter(&index, &mut single, 1).unwrap();
        for workers in [2, 3, 8] {
            let mut many = start.clone();
            recenter(&index, &mut many, workers).unwrap();
            assert_eq!(many, single);
        }
    }

    #[test]
    fn failed_seeding_leaves_assignments_alone() {
        let mut index = TotalIndex::new();
        index.add(&RawDocument::new("d0", vec![], 1).with_term("a", 1)).unwrap();
        index.add(&RawDocument::new("d1", vec![], 1).with_term("b", 1)).unwrap();
        index.documents[0].cluster_id = 1;
        index.documents[1].cluster_id = 0;
        index.centroids = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let tail = index.forward.lists[1].last as usize;
        index.forward.postings[tail].entity_id = 9;

        let mut rng = StdRng::seed_from_u64(3);
        let err = kmeans(&mut index, &KMeansConfig::new(2), &mut rng).unwrap_err();
        assert!(matches!(err, IndexError::Corruption(_)));
        assert_eq!(index.documents[0].cluster_id, 1);
        assert_eq!(index.documents[1].cluster_id, 0);
        assert_eq!(index.centroids.len(), 2);
    }

    #[test]
    fn top_classes_orders_by_count() {
        let counts = HashMap::from([(3, 1), (1, 4), (2, 4), (0, 2)]);
        assert_eq!(top_classes(&counts, 3), vec![1, 2, 0]);
    }
}
