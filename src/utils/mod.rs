pub mod uart_replay_error;
