pub mod memory_network;
