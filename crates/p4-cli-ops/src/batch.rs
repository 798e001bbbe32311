//! Splitting long file lists across several p4 invocations.

/// Maximum joined length of the file arguments of one invocation.
pub const MAX_ARG_LEN: usize = 8000;

/// Command lines longer than this are logged; Windows rejects them.
pub const MAX_CMD_LEN: usize = 8190;

/// Group `args` so the space-joined length of each group stays within
/// `max_len`. An argument that alone exceeds the limit gets its own group.
/// Order is preserved. An empty input yields no groups.
pub fn split_into_batches(args: &[String], max_len: usize) -> Vec<Vec<String>> {
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for arg in args {
        let added = if current.is_empty() {
            arg.len()
        } else {
            arg.len() + 1
        };

        if !current.is_empty() && current_len + added > max_len {
            batches.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current_len += if current.is_empty() {
            arg.len()
        } else {
            arg.len() + 1
        };
        current.push(arg.clone());
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
