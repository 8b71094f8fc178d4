// Copyright 2016 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transaction pool glue and the `WantedTx` solicitation timer.

extern crate log;
extern crate parking_lot;
extern crate veil_core;
extern crate veil_util;

pub mod tx_pool;
pub mod wanted_tx;

pub use crate::tx_pool::{Mempool, TxPool, MAX_POOL_TRANSACTIONS};
pub use crate::wanted_tx::WantedTx;
