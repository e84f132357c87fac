//! Centroid math for theme clustering.

pub use triage_vector::cosine_similarity;

/// Arithmetic mean of a set of vectors. Empty input gives an empty vector.
pub fn calculate_centroid(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };

    let dim = first.len();
    let n = vectors.len() as f32;
    let mut centroid = vec![0.0; dim];

    for vec in vectors {
        for (i, &val) in vec.iter().enumerate().take(dim) {
            centroid[i] += val;
        }
    }
    for val in &mut centroid {
        *val /= n;
    }
    centroid
}

/// Fold `vector` into a mean over `count` members, giving the mean over
/// `count + 1`.
pub fn running_mean_add(centroid: &mut [f32], count: usize, vector: &[f32]) {
    let n = (count + 1) as f32;
    for (c, &v) in centroid.iter_mut().zip(vector) {
        *c += (v - *c) / n;
    }
}

/// Take `vector` out of a mean over `count` members. Returns false when
/// nothing remains (`count <= 1`), in which case the centroid is untouched.
pub fn running_mean_remove(centroid: &mut [f32], count: usize, vector: &[f32]) -> bool {
    if count <= 1 {
        return false;
    }
    let n = count as f32;
    for (c, &v) in centroid.iter_mut().zip(vector) {
        *c = (*c * n - v) / (n - 1.0);
    }
    true
}

/// Size-weighted mean of two centroids.
pub fn merge_centroids(a: &[f32], a_count: usize, b: &[f32], b_count: usize) -> Vec<f32> {
    let total = (a_count + b_count) as f32;
    if total == 0.0 {
        return a.to_vec();
    }
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x * a_count as f32 + y * b_count as f32) / total)
        .collect()
}

/// Average pairwise cosine similarity; 1.0 for fewer than two members.
pub fn cohesion(vectors: &[&[f32]]) -> f32 {
    let n = vectors.len();
    if n < 2 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += cosine_similarity(vectors[i], vectors[j]);
            pairs += 1;
        }
    }
    sum / pairs as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_calculate_centroid() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(approx(&calculate_centroid(&[&a, &b]), &[0.5, 0.5]));
        assert!(calculate_centroid(&[]).is_empty());
    }

    #[test]
    fn test_running_mean_matches_batch_mean() {
        let vectors: [[f32; 2]; 3] = [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]];
        let mut centroid = vectors[0].to_vec();
        running_mean_add(&mut centroid, 1, &vectors[1]);
        running_mean_add(&mut centroid, 2, &vectors[2]);

        let refs: Vec<&[f32]> = vectors.iter().map(|v| v.as_slice()).collect();
        assert!(approx(&centroid, &calculate_centroid(&refs)));

        assert!(running_mean_remove(&mut centroid, 3, &vectors[2]));
        assert!(approx(&centroid, &[0.5, 0.5]));
    }

    #[test]
    fn test_remove_last_member() {
        let mut centroid = vec![1.0, 0.0];
        assert!(!running_mean_remove(&mut centroid, 1, &[1.0, 0.0]));
        assert_eq!(centroid, vec![1.0, 0.0]);
    }

    #[test]
    fn test_merge_centroids_weights_by_size() {
        let merged = merge_centroids(&[1.0, 0.0], 3, &[0.0, 1.0], 1);
        assert!(approx(&merged, &[0.75, 0.25]));
    }

    #[test]
    fn test_cohesion() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((cohesion(&[&a, &a]) - 1.0).abs() < 1e-6);
        assert!(cohesion(&[&a, &b]).abs() < 1e-6);
        assert_eq!(cohesion(&[&a]), 1.0);
    }
}
