//! Contract bindings.
//!
//! Only the events and read methods consumed by the pipeline are declared.

use alloy::sol;

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    contract ERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function balanceOf(address owner) external view returns (uint256);
    }
}

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    contract Vault {
        event Deposit(address indexed user, uint256 assets, uint256 shares);
        event Withdraw(address indexed user, uint256 assets, uint256 shares);
        event MissionCompleted(address indexed user, uint256 indexed missionId);

        function asset() external view returns (address);
        function totalShares() external view returns (uint256);
        function totalAssets() external view returns (uint256);
        function sharesOf(address user) external view returns (uint256);
    }
}
