// Search strategies over the FM-index: maximal exact matches and greedy
// seed-and-extend with a mismatch budget, both scored with BLOSUM62.

pub mod blosum;
pub mod greedy;
pub mod mem;
