#[cfg(test)]
mod timer_test;

pub(crate) mod rtx_timer;
