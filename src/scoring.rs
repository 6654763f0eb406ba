//! Pure BM25 math (C2). See spec §4.4.

pub const K1: f64 = 1.2;
pub const B: f64 = 0.75;

/// Inverse document frequency. Always non-negative for `df <= N`.
pub fn idf(df: usize, total_docs: usize) -> f64 {
    let df = df as f64;
    let n = total_docs as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Per-term BM25 score.
pub fn bm25(tf: u32, dl: usize, avgdl: f64, idf_term: f64) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    let tf = tf as f64;
    let dl = dl as f64;
    let avgdl = if avgdl <= 0.0 { 1.0 } else { avgdl };
    idf_term * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / avgdl))
}
